//! Stats command handler

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use prism_core::{tree, Document, SceneTemplate, ViewType};

use super::read_document;
use crate::output::Output;

/// Shape and size of one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub id: String,
    pub title: Option<String>,
    /// Top-level blocks under the root
    pub blocks: usize,
    /// All nodes, the root included
    pub nodes: usize,
    pub max_depth: usize,
    pub words: usize,
    pub node_types: BTreeMap<String, usize>,
    pub scene_template: Option<SceneTemplate>,
    pub view_type: Option<ViewType>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentStats {
    pub fn collect(doc: &Document) -> Self {
        let mut node_types = BTreeMap::new();
        let mut words = 0;
        tree::traverse(doc, |node, path, _| {
            if path.is_empty() {
                return;
            }
            *node_types.entry(node.node_type.to_string()).or_insert(0) += 1;
            if let Some(ref content) = node.content {
                words += content.split_whitespace().count();
            }
        });

        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            blocks: doc.blocks().len(),
            nodes: tree::node_count(doc),
            max_depth: tree::max_depth(doc),
            words,
            node_types,
            scene_template: doc.metadata.scene_template,
            view_type: doc.metadata.view_type,
            updated_at: doc.metadata.updated_at,
        }
    }
}

/// Show statistics for a document file
pub fn show(path: &Path, output: &Output) -> Result<()> {
    let doc = read_document(path)?;
    output.print_stats(&DocumentStats::collect(&doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::sample_document;

    #[test]
    fn test_collect_stats() {
        let stats = DocumentStats::collect(&sample_document());

        assert_eq!(stats.blocks, 3);
        // root + heading + paragraph + list + two items
        assert_eq!(stats.nodes, 6);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.words, 6);
        assert_eq!(stats.node_types.get("list-item"), Some(&2));
        assert!(!stats.node_types.contains_key("group"));
        assert_eq!(stats.scene_template, Some(SceneTemplate::Research));
    }

    #[test]
    fn test_collect_empty_document() {
        let stats = DocumentStats::collect(&Document::with_id("empty"));
        assert_eq!(stats.blocks, 0);
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.words, 0);
        assert!(stats.node_types.is_empty());
    }
}
