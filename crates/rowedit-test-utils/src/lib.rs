//! Testing utilities for the rowedit workspace
//!
//! Shared fixtures and scripted persisters.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rowedit_core::{
    CatalogEntry, CommitError, ControllerConfig, EditSessionController, MemberId, Persister,
    RoleId, ValueCatalog,
};
use std::collections::VecDeque;
use tokio::sync::Semaphore;

pub type AccessController = EditSessionController<MemberId, RoleId>;

pub fn member(id: &str) -> MemberId {
    MemberId::from(id)
}

pub fn role(id: &str) -> RoleId {
    RoleId::from(id)
}

/// u1 = read, u2 = write, u3 = admin
pub fn access_table() -> Vec<(MemberId, RoleId)> {
    vec![
        (member("u1"), role("read")),
        (member("u2"), role("write")),
        (member("u3"), role("admin")),
    ]
}

pub fn seeded_controller() -> AccessController {
    EditSessionController::with_rows(ControllerConfig::new(), access_table())
}

/// Nothing seeded; base values come from `access_table` on demand
pub fn lookup_controller() -> AccessController {
    let directory: std::collections::HashMap<MemberId, RoleId> =
        access_table().into_iter().collect();
    EditSessionController::new(ControllerConfig::new())
        .with_base_lookup(move |id: &MemberId| directory.get(id).cloned())
}

pub fn role_catalog() -> ValueCatalog<RoleId> {
    ValueCatalog::new(vec![
        CatalogEntry::new(role("read"), "Read", "View and clone"),
        CatalogEntry::new(role("write"), "Write", "Push to branches"),
        CatalogEntry::new(role("admin"), "Admin", "Full access"),
    ])
    .unwrap()
}

/// Records every call; replies with scripted outcomes, then `Ok(())`
#[derive(Debug)]
pub struct RecordingPersister<K, V> {
    calls: Mutex<Vec<(K, V)>>,
    outcomes: Mutex<VecDeque<Result<(), CommitError>>>,
}

impl<K: Clone, V: Clone> RecordingPersister<K, V> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a failure for the next unscripted call
    pub fn fail_next(&self, err: CommitError) {
        self.outcomes.lock().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<(K, V)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, id: K, value: V) -> Result<(), CommitError> {
        self.calls.lock().push((id, value));
        self.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

impl<K: Clone, V: Clone> Default for RecordingPersister<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Persister<K, V> for RecordingPersister<K, V>
where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    async fn persist(&self, id: K, value: V) -> Result<(), CommitError> {
        self.record(id, value)
    }
}

/// Holds every call until [`release`](Self::release) is called
///
/// The call is recorded when it starts, so tests can observe a commit in
/// flight.
#[derive(Debug)]
pub struct GatedPersister<K, V> {
    gate: Semaphore,
    inner: RecordingPersister<K, V>,
}

impl<K: Clone, V: Clone> GatedPersister<K, V> {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            inner: RecordingPersister::new(),
        }
    }

    /// Let one held call resolve
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn fail_next(&self, err: CommitError) {
        self.inner.fail_next(err);
    }

    pub fn calls(&self) -> Vec<(K, V)> {
        self.inner.calls()
    }
}

impl<K: Clone, V: Clone> Default for GatedPersister<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Persister<K, V> for GatedPersister<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn persist(&self, id: K, value: V) -> Result<(), CommitError> {
        self.inner.calls.lock().push((id, value));
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| CommitError::rejected("gate closed"))?;
        permit.forget();
        self.inner.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// Yield until `done` holds, up to a bounded number of turns
pub async fn yield_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..1_000 {
        if done() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    done()
}

pub type AccessPersister = RecordingPersister<MemberId, RoleId>;

pub type GatedAccessPersister = GatedPersister<MemberId, RoleId>;
