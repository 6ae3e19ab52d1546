use proptest::prelude::*;
use rowedit_core::{allowed_events, next_status, RowEvent, RowStatus};

fn any_status() -> impl Strategy<Value = RowStatus> {
    prop_oneof![
        Just(RowStatus::Clean),
        Just(RowStatus::Pending),
        Just(RowStatus::Committing),
    ]
}

fn any_event() -> impl Strategy<Value = RowEvent> {
    prop::sample::select(RowEvent::ALL.to_vec())
}

#[test]
fn test_clean_transitions() {
    assert_eq!(next_status(RowStatus::Clean, RowEvent::Stage), Ok(RowStatus::Pending));
    assert_eq!(next_status(RowStatus::Clean, RowEvent::Cancel), Ok(RowStatus::Clean));

    // Invalid
    assert!(next_status(RowStatus::Clean, RowEvent::Commit).is_err());
    assert!(next_status(RowStatus::Clean, RowEvent::CommitSucceeded).is_err());
}

#[test]
fn test_pending_transitions() {
    assert_eq!(next_status(RowStatus::Pending, RowEvent::Stage), Ok(RowStatus::Pending));
    assert_eq!(next_status(RowStatus::Pending, RowEvent::Cancel), Ok(RowStatus::Clean));
    assert_eq!(
        next_status(RowStatus::Pending, RowEvent::Commit),
        Ok(RowStatus::Committing)
    );
}

#[test]
fn test_committing_transitions() {
    assert_eq!(
        next_status(RowStatus::Committing, RowEvent::CommitSucceeded),
        Ok(RowStatus::Clean)
    );

    // Edits are locked out until the commit resolves
    assert!(next_status(RowStatus::Committing, RowEvent::Stage).is_err());
    assert!(next_status(RowStatus::Committing, RowEvent::Cancel).is_err());
    assert!(next_status(RowStatus::Committing, RowEvent::Commit).is_err());
}

proptest! {
    #[test]
    fn prop_allowed_events_match_next_status(from in any_status(), event in any_event()) {
        let res = next_status(from, event);
        let allowed = allowed_events(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&event));
        } else {
            prop_assert!(!allowed.contains(&event));
        }
    }

    #[test]
    fn prop_only_resolution_leaves_committing(event in any_event()) {
        let res = next_status(RowStatus::Committing, event);
        let resolves = matches!(event, RowEvent::CommitSucceeded | RowEvent::CommitFailed);
        prop_assert_eq!(res.is_ok(), resolves);
    }

    #[test]
    fn prop_cancel_is_idempotent(from in any_status()) {
        if let Ok(once) = next_status(from, RowEvent::Cancel) {
            prop_assert_eq!(next_status(once, RowEvent::Cancel), Ok(once));
        }
    }
}
