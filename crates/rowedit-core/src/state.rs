//! Row lifecycle state machine
//!
//! `Clean --stage--> Pending --commit--> Committing --success--> Clean`,
//! with `Committing --failure--> Pending`. Nothing else leaves `Committing`.

use crate::error::TransitionError;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a row, derived from its edit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowStatus {
    /// No staged value
    Clean,
    /// Staged value awaiting commit or cancel
    Pending,
    /// Commit in flight
    Committing,
}

/// Event applied to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowEvent {
    /// New selection staged
    Stage,
    /// Staged value discarded
    Cancel,
    /// Commit started
    Commit,
    /// Persist resolved successfully
    CommitSucceeded,
    /// Persist failed
    CommitFailed,
}

impl RowEvent {
    /// All events, in declaration order
    pub const ALL: [RowEvent; 5] = [
        RowEvent::Stage,
        RowEvent::Cancel,
        RowEvent::Commit,
        RowEvent::CommitSucceeded,
        RowEvent::CommitFailed,
    ];

    /// Operation name used in error messages
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            RowEvent::Stage => "stage",
            RowEvent::Cancel => "cancel",
            RowEvent::Commit => "commit",
            RowEvent::CommitSucceeded | RowEvent::CommitFailed => "resolve",
        }
    }
}

/// Apply an event, returning the next status.
///
/// Cancel on a clean row is a legal no-op so that repeated cancels are
/// idempotent.
pub fn next_status(from: RowStatus, event: RowEvent) -> Result<RowStatus, TransitionError> {
    use RowEvent::*;
    use RowStatus::*;
    match (from, event) {
        (Clean | Pending, Stage) => Ok(Pending),
        (Clean | Pending, Cancel) => Ok(Clean),
        (Pending, Commit) => Ok(Committing),
        (Committing, CommitSucceeded) => Ok(Clean),
        (Committing, CommitFailed) => Ok(Pending),
        _ => Err(TransitionError { from, event }),
    }
}

/// Events accepted from a status
pub fn allowed_events(from: RowStatus) -> Vec<RowEvent> {
    RowEvent::ALL
        .into_iter()
        .filter(|event| next_status(from, *event).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committing_only_resolves() {
        assert_eq!(
            allowed_events(RowStatus::Committing),
            vec![RowEvent::CommitSucceeded, RowEvent::CommitFailed]
        );
    }

    #[test]
    fn clean_cannot_commit() {
        let err = next_status(RowStatus::Clean, RowEvent::Commit).unwrap_err();
        assert_eq!(err.from, RowStatus::Clean);
        assert_eq!(err.event, RowEvent::Commit);
    }

    #[test]
    fn failure_returns_to_pending() {
        assert_eq!(
            next_status(RowStatus::Committing, RowEvent::CommitFailed),
            Ok(RowStatus::Pending)
        );
    }
}
