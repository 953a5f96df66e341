//! Typed adapter events
//!
//! Adapters report user activity to the orchestrator through an unbounded
//! channel of [`AdapterEvent`]. Each adapter instance gets a fresh channel,
//! so dropping the receiver is enough to silence a replaced adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::error::AdapterError;
use crate::document::Document;
use crate::node::{AstNode, NodeId, NodePatch, Position};
use crate::selection::Selection;
use crate::tree::{self, TreeResult};

/// Sending half handed to an adapter
pub type EventSink = mpsc::UnboundedSender<AdapterEvent>;

/// Receiving half held by the orchestrator
pub type EventStream = mpsc::UnboundedReceiver<AdapterEvent>;

/// Create a fresh adapter event channel
pub fn event_channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

/// Events emitted by a view adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AdapterEvent {
    NodeClick {
        node_id: NodeId,
    },
    NodeDoubleClick {
        node_id: NodeId,
    },
    SelectionChange {
        selection: Selection,
    },
    /// View-specific state such as viewport or layout changes
    ViewChange {
        tag: String,
        payload: Value,
    },
    Focus,
    Blur,
    /// Keystroke-level content change; debounced by the orchestrator
    TextChange {
        node_id: NodeId,
        text: String,
    },
    Error {
        error: AdapterError,
    },
    NodeDrag {
        node_id: NodeId,
        position: Position,
    },
    EdgeClick {
        edge_id: NodeId,
    },
    /// Structural edit performed inside the view
    Edit {
        edit: TreeEdit,
    },
}

impl AdapterEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AdapterEvent::NodeClick { .. } => "node-click",
            AdapterEvent::NodeDoubleClick { .. } => "node-double-click",
            AdapterEvent::SelectionChange { .. } => "selection-change",
            AdapterEvent::ViewChange { .. } => "view-change",
            AdapterEvent::Focus => "focus",
            AdapterEvent::Blur => "blur",
            AdapterEvent::TextChange { .. } => "text-change",
            AdapterEvent::Error { .. } => "error",
            AdapterEvent::NodeDrag { .. } => "node-drag",
            AdapterEvent::EdgeClick { .. } => "edge-click",
            AdapterEvent::Edit { .. } => "edit",
        }
    }
}

/// A structural document edit expressed as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum TreeEdit {
    #[serde(rename_all = "camelCase")]
    Add {
        node: AstNode,
        #[serde(default)]
        parent_id: Option<NodeId>,
        #[serde(default)]
        index: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    Remove { node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    Update { node_id: NodeId, patch: NodePatch },
    #[serde(rename_all = "camelCase")]
    Move {
        node_id: NodeId,
        new_parent_id: NodeId,
        new_index: usize,
    },
}

impl TreeEdit {
    /// Operation tag recorded on the resulting snapshot
    pub fn operation(&self) -> &'static str {
        match self {
            TreeEdit::Add { .. } => "add-node",
            TreeEdit::Remove { .. } => "remove-node",
            TreeEdit::Update { .. } => "update-node",
            TreeEdit::Move { .. } => "move-node",
        }
    }

    /// Id of the node the edit targets
    pub fn node_id(&self) -> &str {
        match self {
            TreeEdit::Add { node, .. } => &node.id,
            TreeEdit::Remove { node_id }
            | TreeEdit::Update { node_id, .. }
            | TreeEdit::Move { node_id, .. } => node_id,
        }
    }

    /// Apply the edit, producing a new document
    pub fn apply(&self, doc: &Document) -> TreeResult<Document> {
        match self {
            TreeEdit::Add {
                node,
                parent_id,
                index,
            } => tree::add_node(doc, node.clone(), parent_id.as_deref(), *index),
            TreeEdit::Remove { node_id } => tree::remove_node(doc, node_id),
            TreeEdit::Update { node_id, patch } => tree::update_node(doc, node_id, patch),
            TreeEdit::Move {
                node_id,
                new_parent_id,
                new_index,
            } => tree::move_node(doc, node_id, new_parent_id, *new_index),
        }
    }
}
