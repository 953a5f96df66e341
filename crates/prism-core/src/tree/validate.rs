//! Structural validation

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::document::{Document, DOCUMENT_TYPE};
use crate::node::{AstNode, NodeType};

/// Outcome of [`validate_ast`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// True when no errors were found
    pub valid: bool,
    /// Invariant violations
    pub errors: Vec<String>,
    /// Suspicious but permitted shapes
    pub warnings: Vec<String>,
}

/// Check document invariants
///
/// Verifies the type tag, the root container, global id uniqueness and the
/// consistency of every parent back-reference. Never panics; all findings are
/// collected into the report.
pub fn validate_ast(doc: &Document) -> ValidationReport {
    let mut report = ValidationReport::default();

    if doc.doc_type != DOCUMENT_TYPE {
        report
            .errors
            .push(format!("document type must be '{}', got '{}'", DOCUMENT_TYPE, doc.doc_type));
    }
    if doc.id.trim().is_empty() {
        report.errors.push("document id is empty".to_string());
    }
    if doc.root.node_type != NodeType::Group {
        report.errors.push(format!(
            "root node must be a group, got '{}'",
            doc.root.node_type
        ));
    }
    if doc.root.parent.is_some() {
        report.errors.push("root node must not have a parent".to_string());
    }

    let mut seen = HashSet::new();
    check_node(&doc.root, &mut seen, &mut report);

    report.valid = report.errors.is_empty();
    report
}

fn check_node<'a>(node: &'a AstNode, seen: &mut HashSet<&'a str>, report: &mut ValidationReport) {
    if node.id.trim().is_empty() {
        report.errors.push("node with empty id".to_string());
    } else if !seen.insert(node.id.as_str()) {
        report.errors.push(format!("duplicate node id '{}'", node.id));
    }

    if node.node_type == NodeType::GraphEdge
        && (node.attribute_str("source").is_none() || node.attribute_str("target").is_none())
    {
        report
            .warnings
            .push(format!("edge '{}' is missing a source or target", node.id));
    }

    for child in &node.children {
        match child.parent.as_deref() {
            Some(parent) if parent == node.id => {}
            Some(parent) => report.errors.push(format!(
                "node '{}' claims parent '{}' but is a child of '{}'",
                child.id, parent, node.id
            )),
            None => report.errors.push(format!(
                "node '{}' has no parent reference (expected '{}')",
                child.id, node.id
            )),
        }
        check_node(child, seen, report);
    }
}

/// Fill in missing parent back-references; existing ones are left alone
pub(crate) fn relink_parents(doc: &mut Document) {
    fn relink(node: &mut Arc<AstNode>) {
        let needs_work = node
            .children
            .iter()
            .any(|c| c.parent.is_none() || !c.children.is_empty());
        if !needs_work {
            return;
        }
        let node = Arc::make_mut(node);
        let id = node.id.clone();
        for child in node.children.iter_mut() {
            if child.parent.is_none() {
                Arc::make_mut(child).parent = Some(id.clone());
            }
            relink(child);
        }
    }
    relink(&mut doc.root);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::add_node;

    fn valid_doc() -> Document {
        let doc = Document::with_id("d");
        let doc = add_node(&doc, AstNode::with_id("a", NodeType::Paragraph), None, None).unwrap();
        add_node(&doc, AstNode::with_id("b", NodeType::Paragraph), Some("a"), None).unwrap()
    }

    #[test]
    fn test_valid_document() {
        let report = validate_ast(&valid_doc());
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut doc = valid_doc();
        let mut root = (*doc.root).clone();
        let mut dup = AstNode::with_id("a", NodeType::Text);
        dup.parent = Some("root".into());
        root.children.push(Arc::new(dup));
        doc.root = Arc::new(root);

        let report = validate_ast(&doc);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("duplicate node id 'a'")));
    }

    #[test]
    fn test_rejects_wrong_type_tag_and_root() {
        let mut doc = valid_doc();
        doc.doc_type = "sheet".to_string();
        let mut root = (*doc.root).clone();
        root.node_type = NodeType::Paragraph;
        doc.root = Arc::new(root);

        let report = validate_ast(&doc);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_rejects_inconsistent_parent() {
        let mut doc = valid_doc();
        let mut root = (*doc.root).clone();
        let mut a = (*root.children[0]).clone();
        a.parent = Some("elsewhere".into());
        root.children[0] = Arc::new(a);
        doc.root = Arc::new(root);

        let report = validate_ast(&doc);
        assert!(!report.valid);
        assert!(report.errors[0].contains("claims parent 'elsewhere'"));
    }

    #[test]
    fn test_edge_without_endpoints_warns() {
        let doc = add_node(
            &Document::with_id("d"),
            AstNode::with_id("e", NodeType::GraphEdge),
            None,
            None,
        )
        .unwrap();
        let report = validate_ast(&doc);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_relink_parents() {
        let mut doc = Document::with_id("d");
        let mut root = (*doc.root).clone();
        let mut list = AstNode::with_id("list", NodeType::List);
        list.children.push(Arc::new(AstNode::with_id("li", NodeType::ListItem)));
        root.children.push(Arc::new(list));
        doc.root = Arc::new(root);
        assert!(!validate_ast(&doc).valid);

        relink_parents(&mut doc);
        assert!(validate_ast(&doc).valid);
        assert_eq!(doc.root.children[0].children[0].parent.as_deref(), Some("list"));
    }
}
