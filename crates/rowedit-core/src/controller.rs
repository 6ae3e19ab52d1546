//! Edit session controller
//!
//! Single source of truth for "what is this row's value right now, and is a
//! change pending or saving":
//! - `stage` / `cancel` mutate synchronously from event handlers
//! - `commit` hands the staged value to an injected persist call
//! - at most one commit per row is in flight; rows never block each other

use crate::error::{CommitError, EditError};
use crate::persist::Persister;
use crate::state::{next_status, RowEvent, RowStatus};
use crate::types::{AutoCommit, ControllerConfig, EditableValue, EntityKey, RowView, SessionStats};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of committed values for rows the controller has not seen yet
pub type BaseLookup<K, V> = Arc<dyn Fn(&K) -> Option<V> + Send + Sync>;

/// Edit state of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEditState<V> {
    /// Last known committed value
    pub base: V,
    /// Pending selection
    pub staged: Option<V>,
    /// Commit in flight
    pub committing: bool,
}

impl<V: Clone> RowEditState<V> {
    /// Clean state seeded with a base value
    #[inline]
    #[must_use]
    pub fn new(base: V) -> Self {
        Self {
            base,
            staged: None,
            committing: false,
        }
    }

    /// Staged value if present, else base
    #[inline]
    #[must_use]
    pub fn effective(&self) -> &V {
        self.staged.as_ref().unwrap_or(&self.base)
    }

    /// Derived lifecycle status
    #[must_use]
    pub fn status(&self) -> RowStatus {
        debug_assert!(
            !self.committing || self.staged.is_some(),
            "committing row without staged value"
        );
        match (&self.staged, self.committing) {
            (_, true) => RowStatus::Committing,
            (Some(_), false) => RowStatus::Pending,
            (None, false) => RowStatus::Clean,
        }
    }

    fn view(&self) -> RowView<V> {
        RowView {
            base: self.base.clone(),
            staged: self.staged.clone(),
            effective: self.effective().clone(),
            status: self.status(),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
}

/// Per-table edit controller
///
/// Shared behind an `Arc` by the rows of one table. State is only mutated
/// through [`stage`](Self::stage), [`cancel`](Self::cancel) and
/// [`commit`](Self::commit); the map lock is never held across an await.
///
/// Rows are created lazily: the first `stage` of an unseen id takes its base
/// value from [`seed`](Self::seed), the base lookup, or
/// [`stage_seeded`](Self::stage_seeded).
pub struct EditSessionController<K: EntityKey, V: EditableValue> {
    config: ControllerConfig,
    rows: DashMap<K, RowEditState<V>>,
    base_lookup: Option<BaseLookup<K, V>>,
    counters: Counters,
}

impl<K: EntityKey, V: EditableValue> fmt::Debug for EditSessionController<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSessionController")
            .field("config", &self.config)
            .field("rows", &self.rows.len())
            .field("base_lookup", &self.base_lookup.is_some())
            .field("counters", &self.counters)
            .finish()
    }
}

impl<K: EntityKey, V: EditableValue> EditSessionController<K, V> {
    /// Create empty controller
    #[inline]
    #[must_use]
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            rows: DashMap::new(),
            base_lookup: None,
            counters: Counters::default(),
        }
    }

    /// Resolve base values of unseen rows through `lookup`
    ///
    /// Queries on unseen ids report the looked-up value, and the first
    /// `stage` of such an id creates its row from it. `lookup` is called
    /// without any row locked.
    #[must_use]
    pub fn with_base_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        self.base_lookup = Some(Arc::new(lookup));
        self
    }

    /// Create controller seeded from a row snapshot
    #[must_use]
    pub fn with_rows(config: ControllerConfig, rows: impl IntoIterator<Item = (K, V)>) -> Self {
        let controller = Self::new(config);
        controller.seed(rows);
        controller
    }

    /// Record base values for rows not yet known
    ///
    /// Known rows keep their state, so a refetched snapshot never clobbers
    /// pending edits. Returns the number of new rows.
    pub fn seed(&self, rows: impl IntoIterator<Item = (K, V)>) -> usize {
        let mut added = 0;
        for (id, base) in rows {
            self.rows.entry(id).or_insert_with(|| {
                added += 1;
                RowEditState::new(base)
            });
        }
        tracing::debug!(added, total = self.rows.len(), "seeded rows");
        added
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Stage a new value for a row
    ///
    /// Re-selecting the base value clears the pending change when
    /// `collapse_reselect` is set.
    ///
    /// # Errors
    /// - `EditError::ConcurrentEdit` while the row is committing
    /// - `EditError::UnknownEntity` if the row is unseen and no base value
    ///   is known for it
    pub fn stage(&self, id: &K, value: V) -> Result<(), EditError> {
        let row = match self.rows.get_mut(id) {
            Some(row) => row,
            None => {
                let base = self
                    .lookup_base(id)
                    .ok_or_else(|| EditError::unknown_entity(id))?;
                self.rows
                    .entry(id.clone())
                    .or_insert_with(|| RowEditState::new(base))
            }
        };
        self.stage_row(id, row, value)
    }

    /// Stage a value, creating the row from `base` if it is unseen
    ///
    /// `base` is ignored for known rows.
    ///
    /// # Errors
    /// - `EditError::ConcurrentEdit` while the row is committing
    pub fn stage_seeded(&self, id: &K, base: V, value: V) -> Result<(), EditError> {
        let row = self
            .rows
            .entry(id.clone())
            .or_insert_with(|| RowEditState::new(base));
        self.stage_row(id, row, value)
    }

    fn stage_row(
        &self,
        id: &K,
        mut row: RefMut<'_, K, RowEditState<V>>,
        value: V,
    ) -> Result<(), EditError> {
        next_status(row.status(), RowEvent::Stage)
            .map_err(|e| EditError::from_transition(id, &e))?;

        if self.config.collapse_reselect && value == row.base {
            row.staged = None;
            tracing::debug!(entity = %id, "reselected base value, nothing pending");
        } else {
            tracing::debug!(entity = %id, value = ?value, "staged value");
            row.staged = Some(value);
        }
        Ok(())
    }

    /// Discard the staged value of a row
    ///
    /// Idempotent. Unknown rows have nothing to discard.
    ///
    /// # Errors
    /// - `EditError::ConcurrentEdit` while the row is committing
    pub fn cancel(&self, id: &K) -> Result<(), EditError> {
        let Some(mut row) = self.rows.get_mut(id) else {
            return Ok(());
        };
        next_status(row.status(), RowEvent::Cancel)
            .map_err(|e| EditError::from_transition(id, &e))?;

        if row.staged.take().is_some() {
            tracing::debug!(entity = %id, "cancelled staged value");
        }
        Ok(())
    }

    /// Persist the staged value of a row
    ///
    /// `persist` is called exactly once with the staged value. On success the
    /// value becomes the new base; on failure it stays staged so the caller
    /// can retry or cancel.
    ///
    /// Dropping the returned future before `persist` resolves returns the row
    /// to pending, and `stage` and `cancel` are accepted again. The
    /// controller cannot recall a write that `persist` already handed off
    /// (to a spawned task or a remote call still in progress): that write may
    /// still land after the row was re-staged or cancelled. Callers that drop
    /// commits must either keep `persist` cancel-safe or refetch the row
    /// before trusting its base value.
    ///
    /// # Errors
    /// - `EditError::NothingToCommit` if nothing is staged
    /// - `EditError::ConcurrentEdit` if a commit is already in flight
    /// - `EditError::Commit` if `persist` fails
    pub async fn commit<F, Fut>(&self, id: &K, persist: F) -> Result<(), EditError>
    where
        F: FnOnce(K, V) -> Fut,
        Fut: Future<Output = Result<(), CommitError>>,
    {
        let value = self.begin_commit(id)?;
        let in_flight = InFlight::new(self, id);

        tracing::info!(entity = %id, value = ?value, "commit started");
        let outcome = persist(id.clone(), value.clone()).await;

        match outcome {
            Ok(()) => {
                in_flight.succeed(value);
                tracing::info!(entity = %id, "commit succeeded");
                Ok(())
            }
            Err(source) => {
                in_flight.fail();
                tracing::warn!(entity = %id, error = %source, "commit failed");
                Err(EditError::commit(id, source))
            }
        }
    }

    /// [`commit`](Self::commit) through a fixed transport
    ///
    /// # Errors
    /// Same as [`commit`](Self::commit)
    pub async fn commit_with<P>(&self, id: &K, persister: &P) -> Result<(), EditError>
    where
        P: Persister<K, V> + ?Sized,
    {
        self.commit(id, |id, value| persister.persist(id, value)).await
    }

    /// Stage and commit in one step
    ///
    /// The auto-commit-on-selection flow. Returns `NoChange` without calling
    /// `persist` when the selection collapsed to the base value.
    ///
    /// # Errors
    /// Same as [`stage`](Self::stage) and [`commit`](Self::commit)
    pub async fn stage_and_commit<F, Fut>(
        &self,
        id: &K,
        value: V,
        persist: F,
    ) -> Result<AutoCommit, EditError>
    where
        F: FnOnce(K, V) -> Fut,
        Fut: Future<Output = Result<(), CommitError>>,
    {
        self.stage(id, value)?;
        if !self.is_dirty(id) {
            return Ok(AutoCommit::NoChange);
        }
        self.commit(id, persist).await?;
        Ok(AutoCommit::Committed)
    }

    /// Value to display
    ///
    /// Unseen rows report their base value; `None` only when no base value
    /// is known for the id at all.
    #[must_use]
    pub fn effective_value(&self, id: &K) -> Option<V> {
        match self.rows.get(id) {
            Some(row) => Some(row.effective().clone()),
            None => self.lookup_base(id),
        }
    }

    /// Last committed value
    #[must_use]
    pub fn base_value(&self, id: &K) -> Option<V> {
        match self.rows.get(id) {
            Some(row) => Some(row.base.clone()),
            None => self.lookup_base(id),
        }
    }

    /// Pending selection
    #[must_use]
    pub fn staged_value(&self, id: &K) -> Option<V> {
        self.rows.get(id).and_then(|row| row.staged.clone())
    }

    /// Row has a pending change
    #[must_use]
    pub fn is_dirty(&self, id: &K) -> bool {
        self.rows.get(id).is_some_and(|row| row.staged.is_some())
    }

    /// Row has a commit in flight
    #[must_use]
    pub fn is_committing(&self, id: &K) -> bool {
        self.rows.get(id).is_some_and(|row| row.committing)
    }

    /// Lifecycle status; unknown rows are clean
    #[must_use]
    pub fn status(&self, id: &K) -> RowStatus {
        self.rows
            .get(id)
            .map_or(RowStatus::Clean, |row| row.status())
    }

    /// Snapshot of one row
    #[must_use]
    pub fn row(&self, id: &K) -> Option<RowView<V>> {
        match self.rows.get(id) {
            Some(row) => Some(row.view()),
            None => self.lookup_base(id).map(|base| RowEditState::new(base).view()),
        }
    }

    /// Rows with a staged value
    #[must_use]
    pub fn pending(&self) -> Vec<K> {
        self.rows
            .iter()
            .filter(|entry| entry.staged.is_some())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of known rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows are known
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Session statistics
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            rows_tracked: self.rows.len(),
            commits_started: self.counters.started.load(Ordering::Relaxed),
            commits_succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            commits_failed: self.counters.failed.load(Ordering::Relaxed),
            commits_abandoned: self.counters.abandoned.load(Ordering::Relaxed),
            ..SessionStats::default()
        };
        for entry in self.rows.iter() {
            if entry.staged.is_some() {
                stats.pending += 1;
            }
            if entry.committing {
                stats.committing += 1;
            }
        }
        stats
    }

    fn lookup_base(&self, id: &K) -> Option<V> {
        self.base_lookup.as_ref().and_then(|lookup| lookup(id))
    }

    /// Mark the row committing and take a copy of its staged value
    fn begin_commit(&self, id: &K) -> Result<V, EditError> {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| EditError::nothing_to_commit(id))?;
        next_status(row.status(), RowEvent::Commit)
            .map_err(|e| EditError::from_transition(id, &e))?;

        let value = row
            .staged
            .clone()
            .ok_or_else(|| EditError::nothing_to_commit(id))?;
        row.committing = true;
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Leave `Committing`, adopting `committed` as the new base if given
    fn resolve(&self, id: &K, event: RowEvent, committed: Option<V>) {
        let Some(mut row) = self.rows.get_mut(id) else {
            return;
        };
        debug_assert!(next_status(row.status(), event).is_ok());
        if let Some(value) = committed {
            row.base = value;
            row.staged = None;
        }
        row.committing = false;
    }
}

/// Clears the committing flag of a row when the commit resolves or its
/// future is dropped
struct InFlight<'a, K: EntityKey, V: EditableValue> {
    controller: &'a EditSessionController<K, V>,
    id: &'a K,
    resolved: bool,
}

impl<'a, K: EntityKey, V: EditableValue> InFlight<'a, K, V> {
    fn new(controller: &'a EditSessionController<K, V>, id: &'a K) -> Self {
        Self {
            controller,
            id,
            resolved: false,
        }
    }

    fn succeed(mut self, value: V) {
        self.controller
            .resolve(self.id, RowEvent::CommitSucceeded, Some(value));
        self.controller
            .counters
            .succeeded
            .fetch_add(1, Ordering::Relaxed);
        self.resolved = true;
    }

    fn fail(mut self) {
        self.controller.resolve(self.id, RowEvent::CommitFailed, None);
        self.controller.counters.failed.fetch_add(1, Ordering::Relaxed);
        self.resolved = true;
    }
}

impl<K: EntityKey, V: EditableValue> Drop for InFlight<'_, K, V> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        self.controller.resolve(self.id, RowEvent::CommitFailed, None);
        self.controller
            .counters
            .abandoned
            .fetch_add(1, Ordering::Relaxed);
        tracing::warn!(entity = %self.id, "commit abandoned before persist resolved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> EditSessionController<&'static str, &'static str> {
        EditSessionController::with_rows(
            ControllerConfig::new(),
            vec![("u1", "read"), ("u2", "write")],
        )
    }

    #[test]
    fn seed_keeps_known_rows() {
        let controller = controller();
        controller.stage(&"u1", "admin").unwrap();

        let added = controller.seed(vec![("u1", "write"), ("u3", "read")]);
        assert_eq!(added, 1);
        assert_eq!(controller.len(), 3);
        assert_eq!(controller.base_value(&"u1"), Some("read"));
        assert_eq!(controller.staged_value(&"u1"), Some("admin"));
    }

    #[test]
    fn stage_unknown_row_rejected() {
        let controller = controller();
        let err = controller.stage(&"ghost", "admin").unwrap_err();
        assert!(matches!(err, EditError::UnknownEntity { .. }));
        assert_eq!(controller.effective_value(&"ghost"), None);
        assert!(!controller.is_dirty(&"ghost"));
        assert_eq!(controller.status(&"ghost"), RowStatus::Clean);
    }

    #[test]
    fn stage_seeded_creates_row_once() {
        let controller = EditSessionController::new(ControllerConfig::new());
        controller.stage_seeded(&"u9", "read", "write").unwrap();
        assert_eq!(controller.base_value(&"u9"), Some("read"));
        assert_eq!(controller.effective_value(&"u9"), Some("write"));

        // known rows keep their base
        controller.stage_seeded(&"u9", "admin", "triage").unwrap();
        assert_eq!(controller.base_value(&"u9"), Some("read"));
        assert_eq!(controller.staged_value(&"u9"), Some("triage"));
    }

    #[test]
    fn lookup_miss_leaves_no_row() {
        let controller = EditSessionController::new(ControllerConfig::new())
            .with_base_lookup(|id: &&'static str| (*id == "u9").then_some("read"));
        let err = controller.stage(&"ghost", "admin").unwrap_err();
        assert!(matches!(err, EditError::UnknownEntity { .. }));
        assert!(controller.is_empty());

        controller.stage(&"u9", "read").unwrap();
        assert_eq!(controller.len(), 1);
        assert!(!controller.is_dirty(&"u9"));
    }

    #[test]
    fn reselect_without_collapse_stays_dirty() {
        let controller = EditSessionController::with_rows(
            ControllerConfig::new().with_collapse_reselect(false),
            vec![("u1", "read")],
        );
        controller.stage(&"u1", "read").unwrap();
        assert!(controller.is_dirty(&"u1"));
        assert_eq!(controller.status(&"u1"), RowStatus::Pending);
    }

    #[test]
    fn cancel_unknown_row_is_noop() {
        let controller = controller();
        assert!(controller.cancel(&"ghost").is_ok());
    }

    #[test]
    fn pending_lists_dirty_rows() {
        let controller = controller();
        controller.stage(&"u2", "admin").unwrap();
        assert_eq!(controller.pending(), vec!["u2"]);
    }

    #[tokio::test]
    async fn commit_then_view() {
        let controller = controller();
        controller.stage(&"u1", "write").unwrap();
        controller
            .commit(&"u1", |_, _| async { Ok(()) })
            .await
            .unwrap();

        let view = controller.row(&"u1").unwrap();
        assert_eq!(view.base, "write");
        assert_eq!(view.effective, "write");
        assert_eq!(view.status, RowStatus::Clean);

        let stats = controller.stats();
        assert_eq!(stats.commits_started, 1);
        assert_eq!(stats.commits_succeeded, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn dropped_commit_returns_to_pending() {
        let controller = controller();
        controller.stage(&"u1", "write").unwrap();

        {
            let commit = controller.commit(&"u1", |_, _| futures::future::pending());
            futures::pin_mut!(commit);
            assert!(futures::poll!(commit.as_mut()).is_pending());
            assert!(controller.is_committing(&"u1"));
        }

        assert!(!controller.is_committing(&"u1"));
        assert_eq!(controller.staged_value(&"u1"), Some("write"));
        assert_eq!(controller.stats().commits_abandoned, 1);
    }

    #[tokio::test]
    async fn handed_off_write_outlives_dropped_commit() {
        let controller = controller();
        let (backend, mut received) = tokio::sync::mpsc::unbounded_channel();
        controller.stage(&"u1", "write").unwrap();

        {
            let commit = controller.commit(&"u1", |id, value| {
                let _ = backend.send((id, value));
                futures::future::pending()
            });
            futures::pin_mut!(commit);
            assert!(futures::poll!(commit.as_mut()).is_pending());
        }

        // the row is editable again while the backend still holds the write
        controller.cancel(&"u1").unwrap();
        controller.stage(&"u1", "admin").unwrap();
        assert_eq!(received.try_recv(), Ok(("u1", "write")));
        assert_eq!(controller.base_value(&"u1"), Some("read"));
        assert_eq!(controller.staged_value(&"u1"), Some("admin"));
    }

    #[tokio::test]
    async fn stage_and_commit_no_change() {
        let controller = controller();
        let outcome = controller
            .stage_and_commit(&"u1", "read", |_, _| async {
                Err(CommitError::rejected("must not be called"))
            })
            .await
            .unwrap();
        assert_eq!(outcome, AutoCommit::NoChange);
        assert_eq!(controller.stats().commits_started, 0);
    }
}
