//! Document tree operations
//!
//! Every operation here is pure: it takes a `&Document` and returns a new
//! `Document` (or a typed error), leaving the input untouched so that history
//! snapshots stay independent.
//!
//! ## Copy-on-write
//!
//! Children are stored as `Arc<AstNode>`. A mutation copies only the nodes on
//! the path from the root to the mutated node; every sibling off that path is
//! shared with the previous document by reference. Mutation cost is therefore
//! proportional to depth times branching factor, not to document size.
//!
//! ## Usage
//!
//! ```ignore
//! let doc = Document::new();
//! let doc = tree::add_node(&doc, AstNode::paragraph("Hello"), None, None)?;
//! let report = tree::validate_ast(&doc);
//! assert!(report.valid);
//! ```

mod mutate;
mod query;
mod validate;

use thiserror::Error;

use crate::document::Document;
use crate::node::NodeId;

pub use mutate::{add_node, duplicate_node, move_node, remove_node, update_node};
pub use query::{
    find_node, find_node_by_id, find_nodes, get_ancestors, get_descendants, get_node_by_path,
    get_node_path, get_siblings, max_depth, node_count, traverse,
};
pub use validate::{validate_ast, ValidationReport};

/// Errors produced by tree operations
#[derive(Error, Debug)]
pub enum TreeError {
    /// An operation referenced an id that is not in the tree
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    /// The operation would break a tree invariant, or the input failed validation
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tree operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Serialize a document to canonical JSON
pub fn serialize(doc: &Document) -> TreeResult<String> {
    Ok(serde_json::to_string(doc)?)
}

/// Serialize a document to indented JSON
pub fn serialize_pretty(doc: &Document) -> TreeResult<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Parse a document from JSON and validate it
///
/// Missing parent back-references are filled in; any other invariant
/// violation is reported as [`TreeError::InvalidStructure`].
pub fn deserialize(json: &str) -> TreeResult<Document> {
    let (doc, report) = inspect(json)?;
    if !report.valid {
        return Err(TreeError::InvalidStructure(report.errors.join("; ")));
    }
    Ok(doc)
}

/// Parse a document from JSON without rejecting invariant violations
///
/// Only malformed JSON is an error; everything else lands in the report.
pub fn inspect(json: &str) -> TreeResult<(Document, ValidationReport)> {
    let mut doc: Document = serde_json::from_str(json)?;
    validate::relink_parents(&mut doc);

    let report = validate_ast(&doc);
    Ok((doc, report))
}
