//! Prism Core Library
//!
//! This crate provides the document model and view-adapter synchronization
//! engine behind Prism, a multi-view document editor that presents one
//! document as rich text, a knowledge graph, a canvas, a table or a timeline.
//!
//! # Architecture
//!
//! - **Document tree**: an AST of `Arc`-shared nodes, mutated only through
//!   pure copy-on-write operations
//! - **Snapshot history**: undo/redo, branches, compression and persistence
//! - **View adapters**: renderers behind one async contract, wrapped with
//!   error recovery, performance monitoring and an AI shim
//!
//! The [`EditorOrchestrator`] ties these together and is the main entry point.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut editor = EditorOrchestrator::new(config, Arc::new(headless_registry()));
//! editor.switch_editor(ViewType::RichText).await?;
//!
//! // Edit the document
//! let id = editor.add_node(AstNode::paragraph("Hello"), None, None)?;
//! editor.update_node(&id, NodePatch::content("Hello, world"))?;
//!
//! // Navigate history
//! editor.undo()?;
//! ```
//!
//! # Modules
//!
//! - `node`, `document`: the AST data model
//! - `tree`: pure structural operations, queries and validation
//! - `selection`: node and text-range selection
//! - `history`: snapshot history
//! - `storage`: key-value persistence for history
//! - `adapter`: the view-adapter contract and runtime
//! - `registry`: adapter registrations, recommendation and construction
//! - `orchestrator`: the editor facade
//! - `export`: HTML and Markdown projections
//! - `config`: application configuration

pub mod adapter;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod history;
pub mod node;
pub mod orchestrator;
pub mod registry;
pub mod selection;
pub mod storage;
pub mod tree;

pub use adapter::{
    AdapterError, AdapterEvent, AiProvider, Capabilities, ManagedAdapter, SceneTemplate,
    TreeEdit, ViewAdapter, ViewType,
};
pub use config::Config;
pub use document::Document;
pub use error::{EditorError, EditorResult};
pub use history::{HistoryManager, StateSnapshot};
pub use node::{AstNode, NodeId, NodePatch, NodeType, Position};
pub use orchestrator::EditorOrchestrator;
pub use registry::{headless_registry, AdapterRegistration, AdapterRegistry, Recommendation};
pub use selection::{Selection, TextRange};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use tree::TreeError;
