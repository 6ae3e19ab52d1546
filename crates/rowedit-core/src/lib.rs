//! rowedit core - per-row optimistic edit controller
//!
//! Coordinates concurrent, independent, asynchronously committed edits over
//! the rows of one table:
//! - Stages a pending value per row without blocking other rows
//! - Commits through an injected persist call, one in flight per row
//! - Cancels pending values, restoring the committed one
//! - Exposes effective value, dirty and committing flags for rendering
//!
//! # Example
//!
//! ```rust,ignore
//! use rowedit_core::{ControllerConfig, EditSessionController, MemberId, RoleId};
//!
//! # async fn example() -> Result<(), rowedit_core::EditError> {
//! let rows = vec![(MemberId::from("u1"), RoleId::from("read"))];
//! let controller = EditSessionController::with_rows(ControllerConfig::new(), rows);
//!
//! let member = MemberId::from("u1");
//! controller.stage(&member, RoleId::from("write"))?;
//! controller
//!     .commit(&member, |id, role| async move { backend.assign(id, role).await })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod catalog;
pub mod controller;
pub mod error;
pub mod persist;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use catalog::{CatalogEntry, CatalogState, ValueCatalog};
pub use controller::{EditSessionController, RowEditState};
pub use error::{BoxError, CatalogError, CommitError, ConfigError, EditError, TransitionError};
pub use persist::{persist_fn, FnPersister, Persister, WithTimeout};
pub use state::{allowed_events, next_status, RowEvent, RowStatus};
pub use types::{
    AutoCommit, ControllerConfig, EditableValue, EntityKey, MemberId, RoleId, RowView,
    SessionStats,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the edit controller
    pub use crate::{
        AutoCommit, CommitError, ControllerConfig, EditError, EditSessionController, MemberId,
        Persister, RoleId, RowStatus, RowView,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn role_column_flow() {
        let controller = Arc::new(EditSessionController::with_rows(
            ControllerConfig::new(),
            vec![
                (MemberId::from("u1"), RoleId::from("read")),
                (MemberId::from("u2"), RoleId::from("admin")),
            ],
        ));
        let catalog = catalog::legacy::parse_role_catalog(r#"["read", "write", "admin"]"#).unwrap();

        let member = MemberId::from("u1");
        let choice = catalog.get(&RoleId::from("write")).unwrap().id.clone();
        controller.stage(&member, choice).unwrap();

        let persister = persist_fn(|_id: MemberId, _role: RoleId| async { Ok(()) });
        controller.commit_with(&member, &persister).await.unwrap();

        let view = controller.row(&member).unwrap();
        assert_eq!(catalog.label_for(&view.effective), "Write");
        assert_eq!(view.status, RowStatus::Clean);
        assert!(controller.pending().is_empty());
    }
}
