//! Structural mutations
//!
//! Each function returns a fresh `Document`. Only the root-to-target path is
//! copied; untouched subtrees are shared with the input.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::query::{find_node_by_id, get_node_path};
use super::{TreeError, TreeResult};
use crate::document::Document;
use crate::node::{AstNode, NodeId, NodePatch};

/// Insert `node` under `parent_id` (or the root) at `index`
///
/// `index` defaults to appending; an index past the end also appends.
/// Fails with `NotFound` if the parent does not resolve and with
/// `InvalidStructure` if any id in `node`'s subtree already exists.
pub fn add_node(
    doc: &Document,
    node: AstNode,
    parent_id: Option<&str>,
    index: Option<usize>,
) -> TreeResult<Document> {
    let parent_path = resolve_parent(doc, parent_id)?;
    ensure_ids_available(doc, &node)?;

    let parent_id = node_at(&doc.root, &parent_path).id.clone();
    let node = Arc::new(reparent(node, &parent_id));
    debug!(node_id = %node.id, parent_id = %parent_id, "add_node");

    let root = rewrite(&doc.root, &parent_path, &mut |parent: &mut AstNode| {
        insert_child(parent, node.clone(), index);
        Ok(())
    })?;
    Ok(commit(doc, root))
}

/// Detach the subtree rooted at `node_id`
pub fn remove_node(doc: &Document, node_id: &str) -> TreeResult<Document> {
    let (root, _removed) = detach(doc, node_id)?;
    debug!(node_id, "remove_node");
    Ok(commit(doc, root))
}

/// Shallow-merge `patch` into the node `node_id`
pub fn update_node(doc: &Document, node_id: &str, patch: &NodePatch) -> TreeResult<Document> {
    let path = get_node_path(doc, node_id).ok_or_else(|| TreeError::NotFound(node_id.into()))?;
    let root = rewrite(&doc.root, &path, &mut |node: &mut AstNode| {
        patch.apply_to(node);
        Ok(())
    })?;
    debug!(node_id, "update_node");
    Ok(commit(doc, root))
}

/// Move `node_id` under `new_parent_id` at `new_index`
///
/// Implemented as remove-then-add, so `new_index` refers to positions in the
/// parent's child list after the node has been taken out.
pub fn move_node(
    doc: &Document,
    node_id: &str,
    new_parent_id: &str,
    new_index: usize,
) -> TreeResult<Document> {
    let node_path =
        get_node_path(doc, node_id).ok_or_else(|| TreeError::NotFound(node_id.into()))?;
    let target_path = get_node_path(doc, new_parent_id)
        .ok_or_else(|| TreeError::NotFound(new_parent_id.into()))?;

    if node_path.is_empty() {
        return Err(TreeError::InvalidStructure(
            "the root node cannot be moved".into(),
        ));
    }
    if target_path.starts_with(&node_path) {
        return Err(TreeError::InvalidStructure(format!(
            "cannot move {} into itself or one of its descendants",
            node_id
        )));
    }

    let (root, removed) = detach(doc, node_id)?;
    let mut moved = (*removed).clone();
    moved.parent = Some(new_parent_id.to_string());
    moved.metadata.updated_at = Utc::now();
    let moved = Arc::new(moved);

    // Removal can shift the target's path when it was a later sibling of an
    // ancestor; resolve it again against the intermediate tree.
    let target_path = path_in(&root, new_parent_id)
        .ok_or_else(|| TreeError::NotFound(new_parent_id.into()))?;
    let root = rewrite(&root, &target_path, &mut |parent: &mut AstNode| {
        insert_child(parent, moved.clone(), Some(new_index));
        Ok(())
    })?;
    debug!(node_id, new_parent_id, new_index, "move_node");
    Ok(commit(doc, root))
}

/// Deep-clone the subtree at `node_id` with every id regenerated
///
/// Without `new_parent_id` the clone is inserted right after the original;
/// with one it is appended to that parent. Returns the new document and the
/// id of the clone's root.
pub fn duplicate_node(
    doc: &Document,
    node_id: &str,
    new_parent_id: Option<&str>,
) -> TreeResult<(Document, NodeId)> {
    let path = get_node_path(doc, node_id).ok_or_else(|| TreeError::NotFound(node_id.into()))?;
    let original = node_at(&doc.root, &path);
    let clone = original.clone_with_new_ids();
    let clone_id = clone.id.clone();

    let result = match new_parent_id {
        Some(parent_id) => add_node(doc, clone, Some(parent_id), None)?,
        None => {
            let Some((&index, parent_path)) = path.split_last() else {
                return Err(TreeError::InvalidStructure(
                    "the root node cannot be duplicated in place".into(),
                ));
            };
            let parent_id = node_at(&doc.root, parent_path).id.clone();
            add_node(doc, clone, Some(&parent_id), Some(index + 1))?
        }
    };
    debug!(node_id, clone_id = %clone_id, "duplicate_node");
    Ok((result, clone_id))
}

// ==================== Internals ====================

/// Copy the path to `path`, applying `edit` to the node at its end
fn rewrite(
    node: &Arc<AstNode>,
    path: &[usize],
    edit: &mut dyn FnMut(&mut AstNode) -> TreeResult<()>,
) -> TreeResult<Arc<AstNode>> {
    let mut copy = (**node).clone();
    match path.split_first() {
        None => edit(&mut copy)?,
        Some((&index, rest)) => {
            let child = copy.children.get(index).cloned().ok_or_else(|| {
                TreeError::InvalidStructure(format!("stale path index {} under {}", index, node.id))
            })?;
            copy.children[index] = rewrite(&child, rest, edit)?;
        }
    }
    Ok(Arc::new(copy))
}

/// Remove a node, returning the new root and the detached subtree
fn detach(doc: &Document, node_id: &str) -> TreeResult<(Arc<AstNode>, Arc<AstNode>)> {
    let path = get_node_path(doc, node_id).ok_or_else(|| TreeError::NotFound(node_id.into()))?;
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(TreeError::InvalidStructure(
            "the root node cannot be removed".into(),
        ));
    };

    let mut removed = None;
    let root = rewrite(&doc.root, parent_path, &mut |parent: &mut AstNode| {
        removed = Some(parent.children.remove(index));
        parent.metadata.updated_at = Utc::now();
        Ok(())
    })?;
    let removed = removed.ok_or_else(|| TreeError::NotFound(node_id.into()))?;
    Ok((root, removed))
}

fn insert_child(parent: &mut AstNode, child: Arc<AstNode>, index: Option<usize>) {
    let index = index
        .unwrap_or(parent.children.len())
        .min(parent.children.len());
    parent.children.insert(index, child);
    parent.metadata.updated_at = Utc::now();
}

fn resolve_parent(doc: &Document, parent_id: Option<&str>) -> TreeResult<Vec<usize>> {
    match parent_id {
        None => Ok(Vec::new()),
        Some(id) => get_node_path(doc, id).ok_or_else(|| TreeError::NotFound(id.into())),
    }
}

fn node_at<'a>(root: &'a AstNode, path: &[usize]) -> &'a AstNode {
    path.iter().fold(root, |node, &i| node.children[i].as_ref())
}

fn path_in(root: &AstNode, id: &str) -> Option<Vec<usize>> {
    if root.id == id {
        return Some(Vec::new());
    }
    for (i, child) in root.children.iter().enumerate() {
        if let Some(mut rest) = path_in(child, id) {
            rest.insert(0, i);
            return Some(rest);
        }
    }
    None
}

/// Reject subtrees whose ids collide with each other or with the document
fn ensure_ids_available(doc: &Document, node: &AstNode) -> TreeResult<()> {
    let mut ids = Vec::new();
    node.collect_ids(&mut ids);

    let mut incoming = HashSet::with_capacity(ids.len());
    for id in &ids {
        if !incoming.insert(id.as_str()) {
            return Err(TreeError::InvalidStructure(format!(
                "duplicate id {} inside inserted subtree",
                id
            )));
        }
    }
    if let Some(id) = ids.iter().find(|id| find_node_by_id(doc, id).is_some()) {
        return Err(TreeError::InvalidStructure(format!(
            "id {} already exists in the document",
            id
        )));
    }
    Ok(())
}

/// Point `node` at `parent_id` and normalize its descendants' back-references
fn reparent(mut node: AstNode, parent_id: &str) -> AstNode {
    node.parent = Some(parent_id.to_string());
    let id = node.id.clone();
    node.children = node
        .children
        .into_iter()
        .map(|child| {
            if child.parent.as_deref() == Some(id.as_str()) {
                child
            } else {
                Arc::new(reparent((*child).clone(), &id))
            }
        })
        .collect();
    node
}

fn commit(doc: &Document, root: Arc<AstNode>) -> Document {
    let mut next = doc.clone();
    next.root = root;
    next.touch();
    next
}
