//! The contract every rendering backend implements

use std::fmt;

use async_trait::async_trait;

use super::error::AdapterError;
use super::event::EventSink;
use super::types::{Capabilities, ViewType, Viewport};
use crate::document::Document;
use crate::node::AstNode;
use crate::selection::Selection;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Options passed to [`ViewAdapter::create`]
#[derive(Clone, Default)]
pub struct AdapterOptions {
    /// Host-side mount point identifier
    pub container: String,
    /// Where the adapter sends its events
    pub events: Option<EventSink>,
    pub read_only: bool,
    pub theme: Option<String>,
}

impl AdapterOptions {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

impl fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("container", &self.container)
            .field("events", &self.events.is_some())
            .field("read_only", &self.read_only)
            .field("theme", &self.theme)
            .finish()
    }
}

/// A rendering backend for one view family
///
/// Implementations only handle their own rendering. Error classification,
/// recovery, timing and AI delegation are layered on by
/// [`ManagedAdapter`](super::ManagedAdapter).
#[async_trait]
pub trait ViewAdapter: Send {
    fn view_type(&self) -> ViewType;

    fn capabilities(&self) -> Capabilities;

    /// Mount into the host container; may suspend
    async fn create(&mut self, options: AdapterOptions) -> AdapterResult<()>;

    /// Render the whole document
    fn render(&mut self, doc: &Document) -> AdapterResult<()>;

    fn add_node(
        &mut self,
        node: &AstNode,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> AdapterResult<()>;

    fn update_node(&mut self, node: &AstNode) -> AdapterResult<()>;

    fn remove_node(&mut self, node_id: &str) -> AdapterResult<()>;

    fn set_selection(&mut self, selection: &Selection) -> AdapterResult<()>;

    fn get_selection(&self) -> Selection;

    fn focus(&mut self);

    fn blur(&mut self);

    fn viewport(&self) -> Viewport;

    fn set_viewport(&mut self, viewport: Viewport) -> AdapterResult<()>;

    /// Release listeners and timers; must tolerate repeated calls
    fn destroy(&mut self);

    /// Drop cached render state
    fn clear_caches(&mut self) {}

    /// Reset pointer and keyboard interaction flags
    fn reset_interaction(&mut self) {}

    /// Approximate memory held by the view, in bytes
    fn memory_usage(&self) -> Option<u64> {
        None
    }
}

/// External AI service used by adapters that declare `supports_ai`
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, prompt: &str, context: Option<&str>) -> anyhow::Result<String>;

    async fn rewrite(&self, text: &str, instruction: &str) -> anyhow::Result<String>;

    async fn suggestions(&self, context: &str) -> anyhow::Result<Vec<String>>;
}
