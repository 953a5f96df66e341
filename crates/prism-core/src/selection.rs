//! Selection model
//!
//! A selection is a plain value: a list of selected node ids, an optional
//! text range local to one node, and a type derived from which of the two
//! are present. It holds no reference into the tree, so it has to be
//! re-validated whenever it may have drifted from the document (for example
//! when an adapter reports a selection after a mutation it did not see).

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::node::NodeId;
use crate::tree;

/// Which parts of a selection are populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    /// Whole nodes
    #[default]
    Node,
    /// A text range inside one node
    Text,
    /// Both nodes and a text range
    Mixed,
}

/// Character offsets local to a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
    pub node_id: NodeId,
}

impl TextRange {
    /// Create a range, ordering the offsets so that `start <= end`
    pub fn new(node_id: impl Into<NodeId>, start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
            node_id: node_id.into(),
        }
    }

    /// Whether the range is a caret (no characters selected)
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Characters covered; deserialized ranges may arrive reversed
    pub fn len(&self) -> usize {
        self.end.abs_diff(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }
}

/// Offset-based selection as reported by text engines (`{from, to}`)
///
/// Text engines address a selection by anchor/head offsets that may be
/// reversed. It is translated into the canonical [`TextRange`] at the
/// adapter boundary; the two are not interchangeable without this mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub from: usize,
    pub to: usize,
}

impl OffsetRange {
    /// Translate into a canonical range on `node_id`
    pub fn into_text_range(self, node_id: impl Into<NodeId>) -> TextRange {
        TextRange::new(node_id, self.from, self.to)
    }

    /// Translate a canonical range back into offsets
    pub fn from_text_range(range: &TextRange) -> Self {
        Self {
            from: range.start,
            to: range.end,
        }
    }
}

/// The current selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Selected node ids, in selection order, without duplicates
    pub node_ids: Vec<NodeId>,
    /// Text range, when a text caret or span is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TextRange>,
    #[serde(rename = "type")]
    pub kind: SelectionKind,
}

/// Build a selection, deriving its kind
///
/// With a range the kind is `Mixed` when node ids are also given and `Text`
/// otherwise; without a range it is `Node`. Duplicate ids are dropped,
/// keeping first occurrences.
pub fn create_selection(node_ids: Vec<NodeId>, range: Option<TextRange>) -> Selection {
    let mut unique: Vec<NodeId> = Vec::with_capacity(node_ids.len());
    for id in node_ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    let kind = derive_kind(&unique, range.as_ref());
    Selection {
        node_ids: unique,
        range,
        kind,
    }
}

fn derive_kind(node_ids: &[NodeId], range: Option<&TextRange>) -> SelectionKind {
    match (range.is_some(), node_ids.is_empty()) {
        (true, false) => SelectionKind::Mixed,
        (true, true) => SelectionKind::Text,
        (false, _) => SelectionKind::Node,
    }
}

impl Selection {
    /// Nothing selected
    pub fn empty() -> Self {
        Self::default()
    }

    /// Select whole nodes
    pub fn nodes<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        create_selection(ids.into_iter().map(Into::into).collect(), None)
    }

    /// Select a text range
    pub fn text(range: TextRange) -> Self {
        create_selection(Vec::new(), Some(range))
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty() && self.range.is_none()
    }

    /// Whether `id` is selected as a node or hosts the text range
    pub fn contains(&self, id: &str) -> bool {
        self.node_ids.iter().any(|n| n == id)
            || self.range.as_ref().is_some_and(|r| r.node_id == id)
    }

    /// Every id this selection refers to
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.node_ids
            .iter()
            .map(String::as_str)
            .chain(self.range.iter().map(|r| r.node_id.as_str()))
    }

    /// Whether every referenced id exists in `doc` and the kind is consistent
    pub fn is_valid_for(&self, doc: &Document) -> bool {
        self.kind == derive_kind(&self.node_ids, self.range.as_ref())
            && self
                .referenced_ids()
                .all(|id| tree::find_node_by_id(doc, id).is_some())
    }

    /// Copy with stale references removed
    ///
    /// Node ids not present in `doc` are dropped, a range whose node is gone
    /// is dropped, and the kind is recomputed from what remains. A range end
    /// past the node's text is clamped.
    pub fn validate_against(&self, doc: &Document) -> Selection {
        let node_ids = self
            .node_ids
            .iter()
            .filter(|id| tree::find_node_by_id(doc, id).is_some())
            .cloned()
            .collect::<Vec<_>>();

        let range = self.range.as_ref().and_then(|range| {
            let node = tree::find_node_by_id(doc, &range.node_id)?;
            let len = node.text_content().chars().count();
            Some(TextRange::new(
                range.node_id.clone(),
                range.start.min(len),
                range.end.min(len),
            ))
        });

        create_selection(node_ids, range)
    }
}
