//! Runtime behaviors composed onto a view adapter
//!
//! `ManagedAdapter` wraps any [`ViewAdapter`] and adds the lifecycle state
//! machine, classified error recovery, performance sampling and the AI shim.
//! Concrete backends implement only rendering; everything here is shared.
//!
//! ```text
//! Uninitialized --create--> Ready --destroy--> Destroyed
//!       ^                                          |
//!       +------------------create------------------+
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::contract::{AdapterOptions, AdapterResult, ViewAdapter};
use super::error::AdapterError;
use super::event::{AdapterEvent, EventSink};
use super::runtime::{
    AiShim, ErrorHandler, ErrorStats, HealthReport, PerformanceMonitor, RecoveryDecision,
    RecoveryStrategy, RuntimeSettings, SampleKind,
};
use super::types::{Capabilities, ViewType, Viewport};
use crate::document::Document;
use crate::node::AstNode;
use crate::selection::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Ready => "ready",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

pub struct ManagedAdapter {
    inner: Box<dyn ViewAdapter>,
    state: LifecycleState,
    events: Option<EventSink>,
    errors: ErrorHandler,
    performance: PerformanceMonitor,
    ai: Arc<AiShim>,
    /// Last successfully rendered document, used to force a re-render
    last_document: Option<Document>,
}

impl fmt::Debug for ManagedAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedAdapter")
            .field("view_type", &self.inner.view_type())
            .field("state", &self.state)
            .field("errors", &self.errors.stats().total)
            .finish()
    }
}

impl ManagedAdapter {
    pub fn new(inner: Box<dyn ViewAdapter>, settings: &RuntimeSettings) -> Self {
        Self {
            inner,
            state: LifecycleState::Uninitialized,
            events: None,
            errors: ErrorHandler::new(settings.error_log_size),
            performance: PerformanceMonitor::new(settings.performance.clone()),
            ai: Arc::new(AiShim::new(
                settings.ai_provider.clone(),
                settings.ai_timeout,
            )),
            last_document: None,
        }
    }

    pub fn view_type(&self) -> ViewType {
        self.inner.view_type()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    /// Mount the adapter, re-initializing on recoverable failures
    ///
    /// Calling this on a ready adapter tears it down first.
    pub async fn create(&mut self, options: AdapterOptions) -> AdapterResult<()> {
        if self.state == LifecycleState::Ready {
            debug!(view_type = %self.view_type(), "re-creating ready adapter");
            self.teardown();
        }

        let mut attempts = 0;
        loop {
            self.performance.record_operation();
            match self.inner.create(options.clone()).await {
                Ok(()) => {
                    if attempts > 0 {
                        self.errors.mark_recovered();
                    }
                    break;
                }
                Err(error) => {
                    let error = self.prepare(error, attempts);
                    match self.errors.handle(&error) {
                        RecoveryDecision::Recover(strategy) => {
                            self.apply(strategy);
                            attempts += 1;
                        }
                        RecoveryDecision::Propagate { mitigation } => {
                            if let Some(strategy) = mitigation {
                                self.apply(strategy);
                            }
                            if let Some(sink) = &options.events {
                                let _ = sink.send(AdapterEvent::Error {
                                    error: error.clone(),
                                });
                            }
                            return Err(error);
                        }
                    }
                }
            }
        }

        self.events = options.events;
        self.state = LifecycleState::Ready;
        info!(view_type = %self.view_type(), container = %options.container, "adapter ready");
        Ok(())
    }

    pub fn render(&mut self, doc: &Document) -> AdapterResult<()> {
        self.guarded("render", Some(SampleKind::Render), |inner| inner.render(doc))?;
        self.last_document = Some(doc.clone());
        Ok(())
    }

    pub fn add_node(
        &mut self,
        node: &AstNode,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> AdapterResult<()> {
        self.guarded("add_node", Some(SampleKind::Update), |inner| {
            inner.add_node(node, parent_id, index)
        })
    }

    pub fn update_node(&mut self, node: &AstNode) -> AdapterResult<()> {
        self.guarded("update_node", Some(SampleKind::Update), |inner| {
            inner.update_node(node)
        })
    }

    pub fn remove_node(&mut self, node_id: &str) -> AdapterResult<()> {
        self.guarded("remove_node", Some(SampleKind::Update), |inner| {
            inner.remove_node(node_id)
        })
    }

    pub fn set_selection(&mut self, selection: &Selection) -> AdapterResult<()> {
        self.guarded("set_selection", None, |inner| inner.set_selection(selection))
    }

    pub fn get_selection(&mut self) -> AdapterResult<Selection> {
        self.guarded("get_selection", None, |inner| Ok(inner.get_selection()))
    }

    pub fn focus(&mut self) -> AdapterResult<()> {
        self.guarded("focus", None, |inner| {
            inner.focus();
            Ok(())
        })
    }

    pub fn blur(&mut self) -> AdapterResult<()> {
        self.guarded("blur", None, |inner| {
            inner.blur();
            Ok(())
        })
    }

    pub fn viewport(&mut self) -> AdapterResult<Viewport> {
        self.guarded("viewport", None, |inner| Ok(inner.viewport()))
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> AdapterResult<()> {
        self.guarded("set_viewport", None, |inner| inner.set_viewport(viewport))
    }

    /// Release the backend and the event sink; safe to call repeatedly
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Destroyed {
            debug!(view_type = %self.view_type(), "adapter already destroyed");
            return;
        }
        self.teardown();
        self.state = LifecycleState::Destroyed;
        info!(view_type = %self.view_type(), "adapter destroyed");
    }

    /// AI shim, present only when the adapter declares `supports_ai`
    pub fn ai(&self) -> Option<Arc<AiShim>> {
        self.capabilities()
            .supports_ai
            .then(|| Arc::clone(&self.ai))
    }

    pub fn health_check(&self) -> HealthReport {
        self.performance.health_check()
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.performance
    }

    pub fn error_stats(&self) -> &ErrorStats {
        self.errors.stats()
    }

    pub fn error_log(&self) -> impl Iterator<Item = &AdapterError> {
        self.errors.log()
    }

    pub fn last_error(&self) -> Option<&AdapterError> {
        self.errors.last_error()
    }

    fn teardown(&mut self) {
        self.inner.destroy();
        self.events = None;
        self.last_document = None;
    }

    /// Run an adapter call with timing, classification and bounded retry
    fn guarded<T>(
        &mut self,
        operation: &'static str,
        sample: Option<SampleKind>,
        mut call: impl FnMut(&mut Box<dyn ViewAdapter>) -> AdapterResult<T>,
    ) -> AdapterResult<T> {
        self.ensure_ready(operation)?;

        let mut attempts = 0;
        loop {
            self.performance.record_operation();
            let timer = sample.map(|kind| self.performance.start(kind));
            let result = call(&mut self.inner);
            if let Some(timer) = timer {
                let memory = self.inner.memory_usage();
                self.performance.finish(timer, memory);
            }

            match result {
                Ok(value) => {
                    if attempts > 0 {
                        self.errors.mark_recovered();
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let error = self.prepare(error, attempts);
                    match self.errors.handle(&error) {
                        // Mounting is async and only `create` can await it, so
                        // the backend stays mounted and the caller sees the error
                        RecoveryDecision::Recover(RecoveryStrategy::Reinitialize) => {
                            warn!(
                                view_type = %self.view_type(),
                                operation,
                                "initialization error on a mounted adapter: {}",
                                error.message
                            );
                            self.errors.mark_propagated();
                            self.emit_error(&error);
                            return Err(error);
                        }
                        RecoveryDecision::Recover(strategy) => {
                            self.apply(strategy);
                            attempts += 1;
                        }
                        RecoveryDecision::Propagate { mitigation } => {
                            if let Some(strategy) = mitigation {
                                self.apply(strategy);
                            }
                            self.emit_error(&error);
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    fn prepare(&mut self, mut error: AdapterError, attempts: u32) -> AdapterError {
        self.performance.record_error();
        error.attempts = attempts;
        if error.view_type.is_none() {
            error.view_type = Some(self.view_type());
        }
        error
    }

    fn ensure_ready(&mut self, operation: &'static str) -> AdapterResult<()> {
        if self.state == LifecycleState::Ready {
            return Ok(());
        }
        let error = AdapterError::not_ready(operation, self.state).for_view(self.view_type());
        warn!(operation, state = %self.state, "call on adapter that is not ready");
        self.errors.report(&error);
        self.emit_error(&error);
        Err(error)
    }

    fn apply(&mut self, strategy: RecoveryStrategy) {
        debug!(view_type = %self.view_type(), ?strategy, "applying recovery strategy");
        match strategy {
            // The `create` loop mounts again on its next attempt
            RecoveryStrategy::Reinitialize => self.inner.destroy(),
            RecoveryStrategy::ForceRerender => {
                if let Some(doc) = &self.last_document {
                    if let Err(e) = self.inner.render(doc) {
                        debug!("forced re-render failed: {}", e);
                    }
                }
            }
            RecoveryStrategy::ClearCaches => self.inner.clear_caches(),
            RecoveryStrategy::ResetInteraction => self.inner.reset_interaction(),
            RecoveryStrategy::Retry => {}
        }
    }

    fn emit_error(&self, error: &AdapterError) {
        if let Some(sink) = &self.events {
            let _ = sink.send(AdapterEvent::Error {
                error: error.clone(),
            });
        }
    }
}

impl Drop for ManagedAdapter {
    fn drop(&mut self) {
        if self.state != LifecycleState::Destroyed {
            self.teardown();
        }
    }
}
