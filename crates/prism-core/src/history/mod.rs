//! Snapshot history
//!
//! Undo/redo over a linear sequence of [`StateSnapshot`]s with a cursor,
//! plus branching, run-length compression and persistence to a pluggable
//! [`Storage`](crate::storage::Storage).
//!
//! ## State machine
//!
//! ```text
//! Empty --add--> Recording <--undo/redo--> Navigating
//!                    ^                          |
//!                    +----------add-------------+   (future is truncated)
//! ```

mod manager;
mod persist;
mod snapshot;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

pub use manager::{BranchInfo, HistoryManager, HistoryStats};
pub use snapshot::{SnapshotMetadata, StateSnapshot};

/// Errors from history operations
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("No storage backend is configured for history")]
    NoStorage,

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// A persisted payload failed structural checks; it has been cleared
    #[error("Invalid persisted history: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize history: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Where the history cursor sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryState {
    /// No snapshots
    Empty,
    /// Cursor on the newest snapshot
    Recording,
    /// Cursor moved back by undo; a new snapshot truncates the future
    Navigating,
}

/// Cursor movement or new snapshot
#[derive(Debug, Clone)]
pub struct StateChange {
    pub before: Option<Arc<StateSnapshot>>,
    pub after: Option<Arc<StateSnapshot>>,
    pub operation: String,
    pub timestamp: DateTime<Utc>,
}

/// Notifications delivered to [`HistoryManager::subscribe`] receivers
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    StateChange(StateChange),
    Compressed { removed: usize },
    Cleared,
    BranchCreated { id: String, name: String },
    BranchSwitched { id: String },
    Saved { snapshots: usize },
    Loaded { snapshots: usize },
}
