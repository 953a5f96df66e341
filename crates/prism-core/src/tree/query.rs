//! Read-only tree queries

use crate::document::Document;
use crate::node::AstNode;

/// First node (pre-order) matching `predicate`
pub fn find_node<'a>(doc: &'a Document, predicate: impl Fn(&AstNode) -> bool) -> Option<&'a AstNode> {
    fn walk<'a>(node: &'a AstNode, predicate: &dyn Fn(&AstNode) -> bool) -> Option<&'a AstNode> {
        if predicate(node) {
            return Some(node);
        }
        node.children.iter().find_map(|c| walk(c, predicate))
    }
    walk(&doc.root, &predicate)
}

/// Every node (pre-order) matching `predicate`
pub fn find_nodes<'a>(doc: &'a Document, predicate: impl Fn(&AstNode) -> bool) -> Vec<&'a AstNode> {
    let mut out = Vec::new();
    collect(&doc.root, &mut |node: &'a AstNode| {
        if predicate(node) {
            out.push(node);
        }
    });
    out
}

/// Node with the given id, the root included
pub fn find_node_by_id<'a>(doc: &'a Document, id: &str) -> Option<&'a AstNode> {
    find_node(doc, |node| node.id == id)
}

/// Visit every node in pre-order
///
/// The visitor receives the node, its root-relative index path (empty for
/// the root) and its parent (`None` for the root).
pub fn traverse<'a>(doc: &'a Document, mut visitor: impl FnMut(&'a AstNode, &[usize], Option<&'a AstNode>)) {
    fn walk<'a>(
        node: &'a AstNode,
        parent: Option<&'a AstNode>,
        path: &mut Vec<usize>,
        visitor: &mut dyn FnMut(&'a AstNode, &[usize], Option<&'a AstNode>),
    ) {
        visitor(node, &path[..], parent);
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            walk(child, Some(node), path, visitor);
            path.pop();
        }
    }
    walk(&doc.root, None, &mut Vec::new(), &mut visitor);
}

/// Root-relative index path of a node (empty for the root)
pub fn get_node_path(doc: &Document, id: &str) -> Option<Vec<usize>> {
    fn walk(node: &AstNode, id: &str, path: &mut Vec<usize>) -> bool {
        if node.id == id {
            return true;
        }
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            if walk(child, id, path) {
                return true;
            }
            path.pop();
        }
        false
    }
    let mut path = Vec::new();
    walk(&doc.root, id, &mut path).then_some(path)
}

/// Node at a root-relative index path
pub fn get_node_by_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a AstNode> {
    path.iter().try_fold(doc.root.as_ref(), |node, &i| {
        node.children.get(i).map(|c| c.as_ref())
    })
}

/// Ancestors of a node, ordered from the root down to its parent
///
/// Empty for the root and for unknown ids.
pub fn get_ancestors<'a>(doc: &'a Document, id: &str) -> Vec<&'a AstNode> {
    let Some(path) = get_node_path(doc, id) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(path.len());
    let mut node = doc.root.as_ref();
    for &i in &path {
        out.push(node);
        node = node.children[i].as_ref();
    }
    out
}

/// All descendants of a node in pre-order, excluding the node itself
pub fn get_descendants<'a>(doc: &'a Document, id: &str) -> Vec<&'a AstNode> {
    let Some(node) = find_node_by_id(doc, id) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for child in &node.children {
        collect(child, &mut |n: &'a AstNode| out.push(n));
    }
    out
}

/// Other children of the node's parent, in order
pub fn get_siblings<'a>(doc: &'a Document, id: &str) -> Vec<&'a AstNode> {
    let ancestors = get_ancestors(doc, id);
    match ancestors.last().copied() {
        Some(parent) => parent
            .children
            .iter()
            .filter(|c| c.id != id)
            .map(|c| c.as_ref())
            .collect(),
        None => Vec::new(),
    }
}

/// Total number of nodes, the root included
pub fn node_count(doc: &Document) -> usize {
    doc.root.subtree_size()
}

/// Depth of the deepest node (the root is at depth 0)
pub fn max_depth(doc: &Document) -> usize {
    fn depth(node: &AstNode) -> usize {
        node.children
            .iter()
            .map(|c| 1 + depth(c))
            .max()
            .unwrap_or(0)
    }
    depth(&doc.root)
}

fn collect<'a>(node: &'a AstNode, sink: &mut dyn FnMut(&'a AstNode)) {
    sink(node);
    for child in &node.children {
        collect(child, sink);
    }
}
