//! AST node model
//!
//! Defines the node type system shared by every view family: rich text,
//! knowledge graph, canvas, table and timeline. Nodes are plain values;
//! the tree they form is only ever assembled through the operations in
//! [`crate::tree`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Node identifier, unique within a document
pub type NodeId = String;

/// Free-form node attributes (heading level, link target, edge endpoints, ...)
pub type Attributes = BTreeMap<String, Value>;

/// Generate a fresh node id with the given prefix
pub fn generate_id(prefix: &str) -> NodeId {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Closed set of node kinds across all view families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    // Rich text
    Paragraph,
    Heading,
    Text,
    List,
    ListItem,
    Blockquote,
    CodeBlock,
    Link,
    Divider,
    // Structural container (the document root is always a group)
    Group,
    // Knowledge graph
    GraphNode,
    GraphEdge,
    // Canvas
    Shape,
    // Table
    Table,
    TableRow,
    TableCell,
    // Timeline
    TimelineItem,
    // AI generated block
    AiBlock,
    // Media
    Image,
    Video,
    Media,
}

impl NodeType {
    /// Stable string tag used in the JSON format
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Paragraph => "paragraph",
            NodeType::Heading => "heading",
            NodeType::Text => "text",
            NodeType::List => "list",
            NodeType::ListItem => "list-item",
            NodeType::Blockquote => "blockquote",
            NodeType::CodeBlock => "code-block",
            NodeType::Link => "link",
            NodeType::Divider => "divider",
            NodeType::Group => "group",
            NodeType::GraphNode => "graph-node",
            NodeType::GraphEdge => "graph-edge",
            NodeType::Shape => "shape",
            NodeType::Table => "table",
            NodeType::TableRow => "table-row",
            NodeType::TableCell => "table-cell",
            NodeType::TimelineItem => "timeline-item",
            NodeType::AiBlock => "ai-block",
            NodeType::Image => "image",
            NodeType::Video => "video",
            NodeType::Media => "media",
        }
    }

    /// Prefix used when generating ids for nodes of this type
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeType::GraphNode => "gnode",
            NodeType::GraphEdge => "edge",
            NodeType::TableCell | NodeType::TableRow | NodeType::Table => "table",
            NodeType::TimelineItem => "tl",
            NodeType::AiBlock => "ai",
            NodeType::Image | NodeType::Video | NodeType::Media => "media",
            NodeType::Shape => "shape",
            _ => "node",
        }
    }

    /// Whether this node kind is laid out spatially (uses `position`)
    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            NodeType::GraphNode | NodeType::Shape | NodeType::TimelineItem
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spatial placement, used by canvas/graph/timeline views and ignored by
/// linear ones
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Per-node bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl NodeMetadata {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }
}

/// A node in the document tree
///
/// Children are reference-counted so that tree mutations can copy only the
/// path from the root to the touched node and share every untouched sibling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNode {
    /// Unique identifier
    pub id: NodeId,
    /// Node kind
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Text payload, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Free-form attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    /// Spatial placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Timestamps and tags
    pub metadata: NodeMetadata,
    /// Ordered children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<AstNode>>,
    /// Id of the parent node (lookup only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
}

impl AstNode {
    /// Create a node of the given type with a freshly generated id
    pub fn new(node_type: NodeType) -> Self {
        Self::with_id(generate_id(node_type.id_prefix()), node_type)
    }

    /// Create a node with a specific id (for loading or tests)
    pub fn with_id(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            content: None,
            attributes: Attributes::new(),
            position: None,
            metadata: NodeMetadata::now(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// Paragraph with text content
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(NodeType::Paragraph).with_content(text)
    }

    /// Heading with level and text content
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::new(NodeType::Heading)
            .with_content(text)
            .with_attribute("level", Value::from(level.clamp(1, 6)))
    }

    /// Graph edge between two node ids
    pub fn edge(source: &str, target: &str) -> Self {
        Self::new(NodeType::GraphEdge)
            .with_attribute("source", Value::from(source))
            .with_attribute("target", Value::from(target))
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.metadata.tags.contains(&tag) {
            self.metadata.tags.push(tag);
        }
        self
    }

    /// Append a child while building a detached subtree
    ///
    /// The child's parent reference is set to this node. Attaching the
    /// result to a document still goes through [`crate::tree::add_node`].
    pub fn with_child(mut self, mut child: AstNode) -> Self {
        child.parent = Some(self.id.clone());
        self.children.push(Arc::new(child));
        self
    }

    /// Look up a string attribute
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Look up an integer attribute
    pub fn attribute_u64(&self, key: &str) -> Option<u64> {
        self.attributes.get(key).and_then(Value::as_u64)
    }

    /// Look up a boolean attribute
    pub fn attribute_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(Value::as_bool)
    }

    /// Whether this node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including this one
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|c| c.subtree_size())
            .sum::<usize>()
    }

    /// Collect every id in this subtree (pre-order)
    pub fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.collect_ids(out);
        }
    }

    /// Concatenated text of this subtree
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        if let Some(ref content) = self.content {
            out.push_str(content);
        }
        for child in &self.children {
            child.push_text(out);
        }
    }

    /// Structural deep copy
    ///
    /// Every child gets a fresh allocation, so the copy shares nothing with
    /// the original.
    pub fn deep_clone(&self) -> AstNode {
        AstNode {
            id: self.id.clone(),
            node_type: self.node_type,
            content: self.content.clone(),
            attributes: self.attributes.clone(),
            position: self.position,
            metadata: self.metadata.clone(),
            children: self
                .children
                .iter()
                .map(|c| Arc::new(c.deep_clone()))
                .collect(),
            parent: self.parent.clone(),
        }
    }

    /// Deep copy with every id in the subtree regenerated
    ///
    /// Parent references inside the copy are rewritten to the new ids; the
    /// copy's own parent is cleared.
    pub fn clone_with_new_ids(&self) -> AstNode {
        self.regenerate(None)
    }

    fn regenerate(&self, parent: Option<&NodeId>) -> AstNode {
        let id = generate_id(self.node_type.id_prefix());
        let now = Utc::now();
        let children = self
            .children
            .iter()
            .map(|c| Arc::new(c.regenerate(Some(&id))))
            .collect();
        AstNode {
            id,
            node_type: self.node_type,
            content: self.content.clone(),
            attributes: self.attributes.clone(),
            position: self.position,
            metadata: NodeMetadata {
                created_at: now,
                updated_at: now,
                tags: self.metadata.tags.clone(),
            },
            children,
            parent: parent.cloned(),
        }
    }
}

/// Partial update for [`crate::tree::update_node`]
///
/// Each `Some` field replaces the node's field wholesale. Identity and
/// structure (`id`, `children`, `parent`) cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Option<Position>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl NodePatch {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(Some(text.into())),
            ..Self::default()
        }
    }

    pub fn position(position: Position) -> Self {
        Self {
            position: Some(Some(position)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_type.is_none()
            && self.content.is_none()
            && self.attributes.is_none()
            && self.position.is_none()
            && self.tags.is_none()
    }

    /// Merge this patch into a node, bumping its `updated_at`
    pub fn apply_to(&self, node: &mut AstNode) {
        if let Some(node_type) = self.node_type {
            node.node_type = node_type;
        }
        if let Some(ref content) = self.content {
            node.content = content.clone();
        }
        if let Some(ref attributes) = self.attributes {
            node.attributes = attributes.clone();
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(ref tags) = self.tags {
            node.metadata.tags = tags.clone();
        }
        node.metadata.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_new_generates_prefixed_id() {
        let node = AstNode::new(NodeType::GraphNode);
        assert!(node.id.starts_with("gnode-"));
        assert!(node.children.is_empty());
        assert!(node.parent.is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = AstNode::new(NodeType::Paragraph);
        let b = AstNode::new(NodeType::Paragraph);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_heading_level_clamped() {
        let heading = AstNode::heading(9, "Title");
        assert_eq!(heading.attribute_u64("level"), Some(6));
        assert_eq!(heading.content.as_deref(), Some("Title"));
    }

    #[test]
    fn test_with_child_sets_parent() {
        let list = AstNode::with_id("list", NodeType::List)
            .with_child(AstNode::with_id("a", NodeType::ListItem))
            .with_child(AstNode::with_id("b", NodeType::ListItem));
        assert_eq!(list.children.len(), 2);
        assert_eq!(list.children[0].parent.as_deref(), Some("list"));
        assert_eq!(list.subtree_size(), 3);
    }

    #[test]
    fn test_text_content_concatenates_subtree() {
        let para = AstNode::with_id("p", NodeType::Paragraph)
            .with_child(AstNode::with_id("t1", NodeType::Text).with_content("Hello, "))
            .with_child(AstNode::with_id("t2", NodeType::Text).with_content("world"));
        assert_eq!(para.text_content(), "Hello, world");
    }

    #[test]
    fn test_deep_clone_shares_no_children() {
        let node = AstNode::with_id("p", NodeType::Paragraph)
            .with_child(AstNode::with_id("t", NodeType::Text));
        let copy = node.deep_clone();
        assert_eq!(node, copy);
        assert!(!Arc::ptr_eq(&node.children[0], &copy.children[0]));
    }

    #[test]
    fn test_clone_with_new_ids_rewrites_parents() {
        let node = AstNode::with_id("list", NodeType::List)
            .with_child(AstNode::with_id("item", NodeType::ListItem).with_content("x"));
        let copy = node.clone_with_new_ids();

        assert_ne!(copy.id, "list");
        assert_ne!(copy.children[0].id, "item");
        assert_eq!(copy.children[0].parent.as_ref(), Some(&copy.id));
        assert_eq!(copy.children[0].content.as_deref(), Some("x"));
        assert!(copy.parent.is_none());
    }

    #[test]
    fn test_patch_replaces_fields() {
        let mut node = AstNode::paragraph("old");
        let before = node.metadata.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));

        let patch = NodePatch {
            content: Some(Some("new".to_string())),
            tags: Some(vec!["draft".to_string()]),
            ..NodePatch::default()
        };
        patch.apply_to(&mut node);

        assert_eq!(node.content.as_deref(), Some("new"));
        assert_eq!(node.metadata.tags, vec!["draft"]);
        assert!(node.metadata.updated_at > before);
    }

    #[test]
    fn test_patch_can_clear_position() {
        let mut node = AstNode::new(NodeType::Shape).with_position(Position::new(1.0, 2.0));
        let patch = NodePatch {
            position: Some(None),
            ..NodePatch::default()
        };
        patch.apply_to(&mut node);
        assert!(node.position.is_none());
    }

    #[test]
    fn test_node_type_serialization() {
        let json = serde_json::to_string(&NodeType::ListItem).unwrap();
        assert_eq!(json, "\"list-item\"");
        let parsed: NodeType = serde_json::from_str("\"graph-edge\"").unwrap();
        assert_eq!(parsed, NodeType::GraphEdge);
        assert_eq!(NodeType::AiBlock.to_string(), "ai-block");
    }

    #[test]
    fn test_node_serialization() {
        let node = AstNode::heading(2, "Intro")
            .with_position(Position::new(10.0, 20.0).with_size(100.0, 40.0))
            .with_tag("outline")
            .with_child(AstNode::with_id("t", NodeType::Text).with_content("Intro"));
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"heading\""));
        let parsed: AstNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, parsed);
    }
}
