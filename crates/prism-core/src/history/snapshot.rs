//! Immutable point-in-time captures of document and selection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapter::{SceneTemplate, ViewType};
use crate::document::Document;
use crate::selection::Selection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Name of the mutation that produced the snapshot
    pub operation: String,
    pub session_id: String,
}

/// A deep, independent copy of the editor state
///
/// Snapshots are shared as `Arc<StateSnapshot>` and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub document: Document,
    pub selection: Selection,
    pub editor_type: ViewType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_template: Option<SceneTemplate>,
    pub metadata: SnapshotMetadata,
}

impl StateSnapshot {
    pub fn capture(
        doc: &Document,
        selection: &Selection,
        editor_type: ViewType,
        scene_template: Option<SceneTemplate>,
        operation: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("snap-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            document: doc.deep_clone(),
            selection: selection.clone(),
            editor_type,
            scene_template,
            metadata: SnapshotMetadata {
                operation: operation.into(),
                session_id: session_id.into(),
            },
        }
    }

    pub fn operation(&self) -> &str {
        &self.metadata.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AstNode;
    use crate::tree;
    use std::sync::Arc;

    #[test]
    fn test_capture_is_independent_of_source() {
        let doc = tree::add_node(&Document::new(), AstNode::paragraph("a"), None, None).unwrap();
        let snap = StateSnapshot::capture(
            &doc,
            &Selection::empty(),
            ViewType::RichText,
            Some(SceneTemplate::Writing),
            "add-node",
            "session-1",
        );

        assert_eq!(snap.document, doc);
        assert!(!Arc::ptr_eq(&snap.document.root, &doc.root));
        assert!(!Arc::ptr_eq(&snap.document.blocks()[0], &doc.blocks()[0]));
        assert_eq!(snap.operation(), "add-node");
        assert!(snap.id.starts_with("snap-"));
    }

    #[test]
    fn test_json_keys() {
        let snap = StateSnapshot::capture(
            &Document::new(),
            &Selection::empty(),
            ViewType::Graph,
            None,
            "clear",
            "s",
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["editorType"], "graph");
        assert_eq!(json["metadata"]["sessionId"], "s");
        assert!(json.get("sceneTemplate").is_none());

        let back: StateSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snap);
    }
}
