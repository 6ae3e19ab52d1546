//! Random operation sequences checked against a plain shadow model.

use proptest::prelude::*;
use rowedit_core::{CommitError, ControllerConfig, EditError, EditSessionController};
use std::collections::HashMap;

const ROWS: [&str; 3] = ["u1", "u2", "u3"];
const ROLES: [&str; 4] = ["read", "triage", "write", "admin"];

#[derive(Debug, Clone)]
enum Op {
    Stage(usize, usize),
    Cancel(usize),
    Commit(usize, bool),
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ROWS.len(), 0..ROLES.len()).prop_map(|(row, role)| Op::Stage(row, role)),
        (0..ROWS.len()).prop_map(Op::Cancel),
        (0..ROWS.len(), any::<bool>()).prop_map(|(row, ok)| Op::Commit(row, ok)),
    ]
}

#[derive(Debug, Clone, PartialEq)]
struct Shadow {
    base: &'static str,
    staged: Option<&'static str>,
}

proptest! {
    #[test]
    fn prop_controller_matches_shadow(ops in prop::collection::vec(any_op(), 1..64)) {
        let controller = EditSessionController::with_rows(
            ControllerConfig::new(),
            ROWS.iter().map(|row| (*row, "read")),
        );
        let mut shadow: HashMap<&str, Shadow> = ROWS
            .iter()
            .map(|row| (*row, Shadow { base: "read", staged: None }))
            .collect();

        for op in ops {
            match op {
                Op::Stage(row, role) => {
                    let (id, value) = (ROWS[row], ROLES[role]);
                    controller.stage(&id, value).unwrap();
                    let entry = shadow.get_mut(id).unwrap();
                    entry.staged = (value != entry.base).then_some(value);
                }
                Op::Cancel(row) => {
                    let id = ROWS[row];
                    controller.cancel(&id).unwrap();
                    shadow.get_mut(id).unwrap().staged = None;
                }
                Op::Commit(row, ok) => {
                    let id = ROWS[row];
                    let result = tokio_test::block_on(controller.commit(&id, |_, _| async move {
                        if ok { Ok(()) } else { Err(CommitError::rejected("flaky")) }
                    }));
                    let entry = shadow.get_mut(id).unwrap();
                    match (entry.staged, ok) {
                        (None, _) => {
                            let rejected = matches!(result, Err(EditError::NothingToCommit { .. }));
                            prop_assert!(rejected, "unexpected {:?}", result);
                        }
                        (Some(value), true) => {
                            prop_assert!(result.is_ok(), "unexpected {:?}", result);
                            entry.base = value;
                            entry.staged = None;
                        }
                        (Some(_), false) => {
                            let failed = matches!(result, Err(EditError::Commit { .. }));
                            prop_assert!(failed, "unexpected {:?}", result);
                        }
                    }
                }
            }

            for id in ROWS {
                let expected = &shadow[id];
                prop_assert_eq!(controller.base_value(&id), Some(expected.base));
                prop_assert_eq!(controller.staged_value(&id), expected.staged);
                prop_assert_eq!(
                    controller.effective_value(&id),
                    Some(expected.staged.unwrap_or(expected.base))
                );
                prop_assert_eq!(controller.is_dirty(&id), expected.staged.is_some());
                prop_assert!(!controller.is_committing(&id));
            }
        }
    }
}
