//! Error types for the edit controller
//!
//! Two kinds of failure:
//! - Contract violations (stage while committing, commit with nothing staged,
//!   unknown row). Reported immediately, never retried.
//! - Commit failures from the injected persist call. Expected and
//!   recoverable: the row stays dirty so the caller can retry or cancel.

use crate::state::{RowEvent, RowStatus};

/// Boxed error returned by an arbitrary persist transport
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main controller error type
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Row has a commit in flight
    #[error("cannot {operation} row {entity}: a commit is in flight")]
    ConcurrentEdit {
        /// Row identifier
        entity: String,
        /// Rejected operation
        operation: &'static str,
    },

    /// Commit requested with no staged value
    #[error("nothing to commit for row {entity}")]
    NothingToCommit {
        /// Row identifier
        entity: String,
    },

    /// Row was never seeded, so no base value is known
    #[error("unknown row {entity}")]
    UnknownEntity {
        /// Row identifier
        entity: String,
    },

    /// Persist call failed; the staged value is retained
    #[error("commit failed for row {entity}: {source}")]
    Commit {
        /// Row identifier
        entity: String,
        /// Underlying failure
        #[source]
        source: CommitError,
    },
}

impl EditError {
    /// Create concurrent edit error
    #[inline]
    pub fn concurrent_edit(entity: impl ToString, operation: &'static str) -> Self {
        Self::ConcurrentEdit {
            entity: entity.to_string(),
            operation,
        }
    }

    /// Create nothing-to-commit error
    #[inline]
    pub fn nothing_to_commit(entity: impl ToString) -> Self {
        Self::NothingToCommit {
            entity: entity.to_string(),
        }
    }

    /// Create unknown entity error
    #[inline]
    pub fn unknown_entity(entity: impl ToString) -> Self {
        Self::UnknownEntity {
            entity: entity.to_string(),
        }
    }

    /// Create commit error
    #[inline]
    pub fn commit(entity: impl ToString, source: CommitError) -> Self {
        Self::Commit {
            entity: entity.to_string(),
            source,
        }
    }

    /// Map an illegal transition onto the matching contract violation
    pub(crate) fn from_transition(entity: impl ToString, err: &TransitionError) -> Self {
        match err.from {
            RowStatus::Committing => Self::concurrent_edit(entity, err.event.verb()),
            RowStatus::Clean | RowStatus::Pending => Self::nothing_to_commit(entity),
        }
    }

    /// Row the error refers to
    #[must_use]
    pub fn entity(&self) -> &str {
        match self {
            Self::ConcurrentEdit { entity, .. }
            | Self::NothingToCommit { entity }
            | Self::UnknownEntity { entity }
            | Self::Commit { entity, .. } => entity,
        }
    }

    /// Check if error is a violated precondition in the calling code
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Commit { .. })
    }

    /// Check if the caller may retry the commit
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Commit { .. })
    }

    /// Underlying commit failure, if any
    #[inline]
    #[must_use]
    pub fn commit_error(&self) -> Option<&CommitError> {
        match self {
            Self::Commit { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure reported by a persist call
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// Transport or backend failure
    #[error("persist failed: {0}")]
    Persist(#[source] BoxError),

    /// Backend refused the change (validation, authorization)
    #[error("persist rejected: {0}")]
    Rejected(String),

    /// Persist did not resolve in time
    #[error("persist timed out after {duration_ms}ms")]
    Timeout {
        /// Elapsed limit
        duration_ms: u64,
    },
}

impl CommitError {
    /// Wrap an arbitrary transport error
    #[inline]
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Persist(err.into())
    }

    /// Create rejection
    #[inline]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Check if error is a timeout
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Illegal row state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition: {event:?} from {from:?}")]
pub struct TransitionError {
    /// Status before the event
    pub from: RowStatus,
    /// Rejected event
    pub event: RowEvent,
}

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Payload does not match any supported shape
    #[error("malformed catalog: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Same id listed twice
    #[error("duplicate catalog id: {0}")]
    DuplicateId(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML did not parse
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file unreadable
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_error_display() {
        let err = EditError::concurrent_edit("u1", "stage");
        assert_eq!(err.to_string(), "cannot stage row u1: a commit is in flight");

        let err = EditError::nothing_to_commit("u2");
        assert!(err.to_string().contains("nothing to commit"));
        assert_eq!(err.entity(), "u2");
    }

    #[test]
    fn edit_error_classification() {
        assert!(EditError::concurrent_edit("u1", "cancel").is_contract_violation());
        assert!(EditError::nothing_to_commit("u1").is_contract_violation());
        assert!(EditError::unknown_entity("u1").is_contract_violation());

        let err = EditError::commit("u1", CommitError::rejected("forbidden"));
        assert!(!err.is_contract_violation());
        assert!(err.is_retryable());
        assert!(matches!(err.commit_error(), Some(CommitError::Rejected(_))));
    }

    #[test]
    fn commit_error_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = CommitError::other(io);
        assert!(err.to_string().contains("reset"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_timeout());
        assert!(CommitError::Timeout { duration_ms: 10 }.is_timeout());
    }

    #[test]
    fn transition_maps_to_contract_violation() {
        let err = TransitionError {
            from: RowStatus::Committing,
            event: RowEvent::Cancel,
        };
        assert!(matches!(
            EditError::from_transition("u1", &err),
            EditError::ConcurrentEdit { operation: "cancel", .. }
        ));

        let err = TransitionError {
            from: RowStatus::Clean,
            event: RowEvent::Commit,
        };
        assert!(matches!(
            EditError::from_transition("u1", &err),
            EditError::NothingToCommit { .. }
        ));
    }
}
