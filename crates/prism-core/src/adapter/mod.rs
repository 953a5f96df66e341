//! View adapters
//!
//! A view adapter presents the document through one rendering backend
//! (rich text, graph, canvas, table, timeline). Backends implement the small
//! [`ViewAdapter`] contract; [`ManagedAdapter`] composes error recovery,
//! performance monitoring and the AI shim on top.
//!
//! Adapters never mutate the document. Structural edits made in a view are
//! reported as [`AdapterEvent::Edit`] and applied by the orchestrator.

pub mod contract;
pub mod error;
pub mod event;
pub mod headless;
pub mod managed;
pub mod runtime;
pub mod types;

pub use contract::{AdapterOptions, AdapterResult, AiProvider, ViewAdapter};
pub use error::{AdapterError, AdapterErrorKind, Severity};
pub use event::{event_channel, AdapterEvent, EventSink, EventStream, TreeEdit};
pub use headless::{HeadlessAdapter, HeadlessStats};
pub use managed::{LifecycleState, ManagedAdapter};
pub use runtime::{AiError, AiShim, HealthReport, RuntimeSettings};
pub use types::{Capabilities, SceneTemplate, UnknownVariant, ViewType, Viewport};
