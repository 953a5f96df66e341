//! Editor-level error taxonomy
//!
//! Module errors (`TreeError`, `HistoryError`, `AdapterError`,
//! `RegistryError`, `AiError`) convert into [`EditorError`] so orchestrator
//! callers deal with a single type.

use thiserror::Error;

use crate::adapter::{AdapterError, AiError, ViewType};
use crate::history::HistoryError;
use crate::node::NodeId;
use crate::registry::RegistryError;
use crate::storage::StorageError;
use crate::tree::TreeError;

#[derive(Error, Debug)]
pub enum EditorError {
    /// A tree operation referenced a missing id
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    /// The document failed validation or an edit would break the tree
    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// The active adapter does not declare the requested capability
    #[error("The {view_type} view does not support {capability}")]
    CapabilityUnavailable {
        view_type: ViewType,
        capability: &'static str,
    },

    #[error("{0}")]
    Timeout(String),

    #[error("No adapter is registered for view type '{0}'")]
    UnsupportedType(ViewType),

    #[error("An AI request is already in progress")]
    AiBusy,

    #[error("AI request failed: {0}")]
    Ai(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("History error: {0}")]
    History(HistoryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Adapter creation was abandoned before it finished
    #[error("Creation of the {0} adapter was cancelled")]
    Cancelled(ViewType),

    #[error("No view adapter is active")]
    NoActiveAdapter,

    #[error("Editor has been destroyed")]
    Destroyed,
}

impl EditorError {
    /// Whether the caller can reasonably retry with different input
    pub fn is_recoverable(&self) -> bool {
        match self {
            EditorError::NotFound(_)
            | EditorError::AiBusy
            | EditorError::Timeout(_)
            | EditorError::CapabilityUnavailable { .. }
            | EditorError::NoActiveAdapter => true,
            EditorError::Adapter(e) => e.recoverable,
            EditorError::Storage(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

impl From<TreeError> for EditorError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NotFound(id) => EditorError::NotFound(id),
            TreeError::InvalidStructure(msg) => EditorError::InvalidStructure(msg),
            TreeError::Serialization(e) => EditorError::Serialization(e),
        }
    }
}

impl From<HistoryError> for EditorError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Storage(e) => EditorError::Storage(e),
            other => EditorError::History(other),
        }
    }
}

impl From<AiError> for EditorError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Busy => EditorError::AiBusy,
            AiError::Timeout { .. } => EditorError::Timeout(err.to_string()),
            other => EditorError::Ai(other.to_string()),
        }
    }
}

impl From<RegistryError> for EditorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnsupportedType(view_type) => EditorError::UnsupportedType(view_type),
            RegistryError::Cancelled(view_type) => EditorError::Cancelled(view_type),
            RegistryError::Adapter(e) => EditorError::Adapter(e),
            RegistryError::LoadFailed { view_type, message } => {
                EditorError::Adapter(
                    AdapterError::new("load", message).for_view(view_type),
                )
            }
        }
    }
}

/// Result type for orchestrator operations
pub type EditorResult<T> = Result<T, EditorError>;
