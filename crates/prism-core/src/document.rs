//! Document AST
//!
//! The `Document` is the single source of truth presented by every view.
//! It is a plain value: mutations go through [`crate::tree`] and produce a
//! new document rather than editing one in place.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::adapter::{SceneTemplate, ViewType};
use crate::node::{AstNode, NodeType};

/// Current document format version
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Type tag every serialized document carries
pub const DOCUMENT_TYPE: &str = "document";

/// Id used for the synthetic root container
pub const ROOT_ID: &str = "root";

/// Document-level bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Usage intent hint, drives view recommendation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_template: Option<SceneTemplate>,
    /// View the document was last edited in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_type: Option<ViewType>,
}

/// View defaults; opaque to the core apart from serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaboration: Option<bool>,
    /// Any other settings, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A complete document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub version: String,
    /// Always [`DOCUMENT_TYPE`]
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Synthetic container of type `group`
    pub root: Arc<AstNode>,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub settings: DocumentSettings,
}

impl Document {
    /// Create an empty document with a random id
    pub fn new() -> Self {
        Self::with_id(format!("doc-{}", Uuid::new_v4()))
    }

    /// Create an empty document with a specific id
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: DOCUMENT_VERSION.to_string(),
            doc_type: DOCUMENT_TYPE.to_string(),
            id: id.into(),
            title: None,
            root: Arc::new(Self::empty_root()),
            metadata: DocumentMetadata {
                created_at: now,
                updated_at: now,
                author: None,
                tags: Vec::new(),
                scene_template: None,
                view_type: None,
            },
            settings: DocumentSettings::default(),
        }
    }

    /// Builder-style title
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder-style scene hint
    pub fn for_scene(mut self, scene: SceneTemplate) -> Self {
        self.metadata.scene_template = Some(scene);
        self
    }

    fn empty_root() -> AstNode {
        AstNode::with_id(ROOT_ID, NodeType::Group)
    }

    /// Top-level nodes (children of the synthetic root)
    pub fn blocks(&self) -> &[Arc<AstNode>] {
        &self.root.children
    }

    /// Whether the document has no content below the root
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Copy of this document with the root emptied, keeping id and settings
    pub fn cleared(&self) -> Self {
        let mut doc = self.clone();
        let mut root = Self::empty_root();
        root.id = self.root.id.clone();
        doc.root = Arc::new(root);
        doc.touch();
        doc
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }

    /// Structural deep copy sharing no nodes with `self`
    pub fn deep_clone(&self) -> Self {
        Self {
            version: self.version.clone(),
            doc_type: self.doc_type.clone(),
            id: self.id.clone(),
            title: self.title.clone(),
            root: Arc::new(self.root.deep_clone()),
            metadata: self.metadata.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_new_is_empty() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.doc_type, DOCUMENT_TYPE);
        assert_eq!(doc.root.node_type, NodeType::Group);
        assert_eq!(doc.root.id, ROOT_ID);
        assert!(doc.id.starts_with("doc-"));
    }

    #[test]
    fn test_builders() {
        let doc = Document::with_id("d1")
            .titled("Notes")
            .for_scene(SceneTemplate::Research);
        assert_eq!(doc.title.as_deref(), Some("Notes"));
        assert_eq!(doc.metadata.scene_template, Some(SceneTemplate::Research));
    }

    #[test]
    fn test_settings_preserve_unknown_keys() {
        let json = r#"{"theme":"dark","fontSize":14,"gridSnap":true}"#;
        let settings: DocumentSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.theme.as_deref(), Some("dark"));
        assert_eq!(settings.font_size, Some(14.0));
        assert_eq!(settings.extra.get("gridSnap"), Some(&Value::Bool(true)));

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["gridSnap"], Value::Bool(true));
    }

    #[test]
    fn test_cleared_keeps_identity() {
        let mut doc = Document::with_id("d1").titled("T");
        let mut root = (*doc.root).clone();
        root.children
            .push(Arc::new(AstNode::with_id("p", NodeType::Paragraph)));
        doc.root = Arc::new(root);

        let cleared = doc.cleared();
        assert!(cleared.is_empty());
        assert_eq!(cleared.id, "d1");
        assert_eq!(cleared.title.as_deref(), Some("T"));
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let doc = Document::new();
        let copy = doc.deep_clone();
        assert_eq!(doc, copy);
        assert!(!Arc::ptr_eq(&doc.root, &copy.root));
    }

    #[test]
    fn test_serialization_uses_type_tag() {
        let doc = Document::with_id("d1");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "document");
        assert_eq!(value["root"]["type"], "group");
        assert!(value["metadata"]["createdAt"].is_string());
    }
}
