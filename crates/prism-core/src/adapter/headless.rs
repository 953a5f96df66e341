//! In-memory reference adapter
//!
//! `HeadlessAdapter` renders into a node index instead of a screen. It backs
//! the CLI and the test suite, and supports fault injection so the recovery
//! paths of [`ManagedAdapter`](super::ManagedAdapter) can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::contract::{AdapterOptions, AdapterResult, ViewAdapter};
use super::error::AdapterError;
use super::event::{AdapterEvent, EventSink};
use super::types::{Capabilities, ViewType, Viewport};
use crate::document::Document;
use crate::node::{AstNode, NodeId, NodeType};
use crate::selection::Selection;

/// Rough per-node footprint used for memory estimates
const NODE_OVERHEAD_BYTES: u64 = 256;

/// Counters shared with whoever created the adapter
#[derive(Debug, Default)]
pub struct HeadlessStats {
    creates: AtomicUsize,
    renders: AtomicUsize,
    node_ops: AtomicUsize,
    destroys: AtomicUsize,
    cache_clears: AtomicUsize,
    interaction_resets: AtomicUsize,
}

impl HeadlessStats {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::Relaxed)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::Relaxed)
    }

    /// Incremental add/update/remove calls
    pub fn node_ops(&self) -> usize {
        self.node_ops.load(Ordering::Relaxed)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::Relaxed)
    }

    pub fn cache_clears(&self) -> usize {
        self.cache_clears.load(Ordering::Relaxed)
    }

    pub fn interaction_resets(&self) -> usize {
        self.interaction_resets.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
struct RenderedNode {
    node_type: NodeType,
    text: String,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Fault {
    remaining: u32,
    error: AdapterError,
}

pub struct HeadlessAdapter {
    view_type: ViewType,
    capabilities: Capabilities,
    events: Option<EventSink>,
    mounted: bool,
    nodes: HashMap<NodeId, RenderedNode>,
    selection: Selection,
    viewport: Viewport,
    focused: bool,
    faults: HashMap<String, Fault>,
    stats: Arc<HeadlessStats>,
}

impl HeadlessAdapter {
    pub fn new(view_type: ViewType) -> Self {
        Self {
            view_type,
            capabilities: Capabilities::for_view(view_type),
            events: None,
            mounted: false,
            nodes: HashMap::new(),
            selection: Selection::empty(),
            viewport: Viewport::default(),
            focused: false,
            faults: HashMap::new(),
            stats: Arc::new(HeadlessStats::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make the next `times` calls of `operation` fail
    pub fn fail_next(mut self, operation: &str, times: u32) -> Self {
        let error = AdapterError::new(operation, "injected failure");
        self.faults.insert(
            operation.to_string(),
            Fault {
                remaining: times,
                error,
            },
        );
        self
    }

    /// Make the next `times` calls of `error.operation` fail with `error`
    pub fn fail_next_with(mut self, error: AdapterError, times: u32) -> Self {
        self.faults.insert(
            error.operation.clone(),
            Fault {
                remaining: times,
                error,
            },
        );
        self
    }

    pub fn stats(&self) -> Arc<HeadlessStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Number of nodes in the render index, root included
    pub fn rendered_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn text_of(&self, node_id: &str) -> Option<&str> {
        self.nodes.get(node_id).map(|n| n.text.as_str())
    }

    /// Send an event as if a user had produced it in the view
    pub fn emit(&self, event: AdapterEvent) -> bool {
        match &self.events {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    fn check_fault(&mut self, operation: &str) -> AdapterResult<()> {
        let Some(fault) = self.faults.get_mut(operation) else {
            return Ok(());
        };
        if fault.remaining == 0 {
            return Ok(());
        }
        fault.remaining -= 1;
        let mut error = fault.error.clone();
        error.timestamp = chrono::Utc::now();
        Err(error)
    }

    fn index_subtree(&mut self, node: &AstNode) {
        self.nodes.insert(
            node.id.clone(),
            RenderedNode {
                node_type: node.node_type,
                text: node.content.clone().unwrap_or_default(),
                children: node.children.iter().map(|c| c.id.clone()).collect(),
            },
        );
        for child in &node.children {
            self.index_subtree(child);
        }
    }

    fn unindex_subtree(&mut self, node_id: &str) {
        if let Some(node) = self.nodes.remove(node_id) {
            for child in node.children {
                self.unindex_subtree(&child);
            }
        }
    }
}

#[async_trait]
impl ViewAdapter for HeadlessAdapter {
    fn view_type(&self) -> ViewType {
        self.view_type
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn create(&mut self, options: AdapterOptions) -> AdapterResult<()> {
        // Real backends mount asynchronously; keep the suspension point
        tokio::task::yield_now().await;
        self.check_fault("create")?;

        self.events = options.events;
        self.mounted = true;
        HeadlessStats::bump(&self.stats.creates);
        debug!(view_type = %self.view_type, container = %options.container, "headless adapter mounted");
        Ok(())
    }

    fn render(&mut self, doc: &Document) -> AdapterResult<()> {
        self.check_fault("render")?;
        self.nodes.clear();
        let root = Arc::clone(&doc.root);
        self.index_subtree(&root);
        HeadlessStats::bump(&self.stats.renders);
        Ok(())
    }

    fn add_node(
        &mut self,
        node: &AstNode,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> AdapterResult<()> {
        self.check_fault("add_node")?;
        let parent_id = parent_id.unwrap_or(crate::document::ROOT_ID);
        let Some(parent) = self.nodes.get_mut(parent_id) else {
            return Err(AdapterError::new(
                "add_node",
                format!("parent '{}' is not rendered", parent_id),
            ));
        };
        let at = index.unwrap_or(parent.children.len()).min(parent.children.len());
        parent.children.insert(at, node.id.clone());
        self.index_subtree(node);
        HeadlessStats::bump(&self.stats.node_ops);
        Ok(())
    }

    fn update_node(&mut self, node: &AstNode) -> AdapterResult<()> {
        self.check_fault("update_node")?;
        let Some(rendered) = self.nodes.get_mut(&node.id) else {
            return Err(AdapterError::new(
                "update_node",
                format!("node '{}' is not rendered", node.id),
            ));
        };
        rendered.node_type = node.node_type;
        rendered.text = node.content.clone().unwrap_or_default();
        HeadlessStats::bump(&self.stats.node_ops);
        Ok(())
    }

    fn remove_node(&mut self, node_id: &str) -> AdapterResult<()> {
        self.check_fault("remove_node")?;
        if !self.nodes.contains_key(node_id) {
            return Err(AdapterError::new(
                "remove_node",
                format!("node '{}' is not rendered", node_id),
            ));
        }
        for rendered in self.nodes.values_mut() {
            rendered.children.retain(|c| c != node_id);
        }
        self.unindex_subtree(node_id);
        HeadlessStats::bump(&self.stats.node_ops);
        Ok(())
    }

    fn set_selection(&mut self, selection: &Selection) -> AdapterResult<()> {
        self.check_fault("set_selection")?;
        self.selection = selection.clone();
        Ok(())
    }

    fn get_selection(&self) -> Selection {
        self.selection.clone()
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) -> AdapterResult<()> {
        self.check_fault("set_viewport")?;
        if !self.capabilities.can_zoom && viewport.zoom != 1.0 {
            return Err(AdapterError::new(
                "set_viewport",
                format!("{} view does not zoom", self.view_type),
            ));
        }
        self.viewport = viewport;
        Ok(())
    }

    fn destroy(&mut self) {
        if !self.mounted && self.events.is_none() {
            return;
        }
        self.events = None;
        self.mounted = false;
        self.nodes.clear();
        self.selection = Selection::empty();
        self.focused = false;
        HeadlessStats::bump(&self.stats.destroys);
    }

    fn clear_caches(&mut self) {
        HeadlessStats::bump(&self.stats.cache_clears);
    }

    fn reset_interaction(&mut self) {
        self.focused = false;
        HeadlessStats::bump(&self.stats.interaction_resets);
    }

    fn memory_usage(&self) -> Option<u64> {
        let text: u64 = self.nodes.values().map(|n| n.text.len() as u64).sum();
        Some(self.nodes.len() as u64 * NODE_OVERHEAD_BYTES + text)
    }
}
