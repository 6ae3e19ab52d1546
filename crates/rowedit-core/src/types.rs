//! Core types for the edit controller
//!
//! Defines:
//! - The key and value bounds the controller is generic over
//! - Concrete identifiers for the access-management table
//! - Controller configuration
//! - Row views and session statistics

use crate::error::ConfigError;
use crate::state::RowStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Bound for row identifiers
///
/// Opaque and comparable. The controller never creates or destroys these,
/// it only attaches state to them.
pub trait EntityKey: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static {}

impl<T> EntityKey for T where T: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static {}

/// Bound for the values assigned to rows
pub trait EditableValue: Eq + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> EditableValue for T where T: Eq + Clone + fmt::Debug + Send + Sync + 'static {}

/// Member identifier (one row of the access table)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    /// Create member ID
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role identifier (the value assigned to a member)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl RoleId {
    /// Create role ID
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Staging the current base value clears the pending change
    pub collapse_reselect: bool,
}

impl ControllerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With reselect collapsing on or off
    #[inline]
    #[must_use]
    pub fn with_collapse_reselect(mut self, collapse: bool) -> Self {
        self.collapse_reselect = collapse;
        self
    }

    /// Parse configuration from TOML
    ///
    /// Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            collapse_reselect: true,
        }
    }
}

/// Owned snapshot of one row, for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView<V> {
    /// Last committed value
    pub base: V,
    /// Pending selection, if any
    pub staged: Option<V>,
    /// Value to display
    pub effective: V,
    /// Lifecycle status
    pub status: RowStatus,
}

impl<V> RowView<V> {
    /// Row has a pending change
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.staged.is_some()
    }

    /// Row has a commit in flight
    #[inline]
    #[must_use]
    pub fn is_committing(&self) -> bool {
        self.status == RowStatus::Committing
    }
}

/// Result of [`stage_and_commit`](crate::EditSessionController::stage_and_commit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoCommit {
    /// The staged value was persisted
    Committed,
    /// The selection matched the base value, nothing was persisted
    NoChange,
}

/// Session statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Rows known to the controller
    pub rows_tracked: usize,
    /// Rows with a staged value (includes committing rows)
    pub pending: usize,
    /// Rows with a commit in flight
    pub committing: usize,
    /// Commits that reached the persist call
    pub commits_started: u64,
    /// Commits that persisted
    pub commits_succeeded: u64,
    /// Commits whose persist call failed
    pub commits_failed: u64,
    /// Commits dropped before persist resolved
    pub commits_abandoned: u64,
}
