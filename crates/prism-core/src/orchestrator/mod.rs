//! Editor orchestration
//!
//! [`EditorOrchestrator`] owns the live document, the selection, the active
//! view adapter and the snapshot history. Every mutation goes through a
//! [`TreeEdit`] applied to the current document; the result replaces the
//! document in one assignment, the view is synced incrementally and a
//! snapshot is recorded.
//!
//! View events arrive on a per-adapter channel and are drained with
//! [`EditorOrchestrator::pump_events`]. Keystroke-level text changes are
//! debounced per node and selection changes are throttled, so history grows
//! with user-meaningful operations rather than raw input.
//!
//! ```ignore
//! let mut editor = EditorOrchestrator::new(config, Arc::new(headless_registry()));
//! editor.switch_editor(ViewType::RichText).await?;
//! editor.add_node(AstNode::paragraph("Hello"), None, None)?;
//! editor.undo()?;
//! ```

mod input;
mod routing;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub use input::{Debouncer, Throttler};

use crate::adapter::{
    event_channel, AdapterError, AdapterOptions, AiProvider, AiShim, Capabilities, EventSink,
    EventStream, HealthReport, ManagedAdapter, RuntimeSettings, SceneTemplate, TreeEdit,
    ViewType,
};
use crate::config::Config;
use crate::document::Document;
use crate::error::{EditorError, EditorResult};
use crate::export;
use crate::history::{BranchInfo, HistoryEvent, HistoryManager, HistoryStats, StateSnapshot};
use crate::node::{AstNode, NodeId, NodePatch};
use crate::registry::{AdapterRegistry, CreationProgress, CreationToken, Recommendation};
use crate::selection::Selection;
use crate::storage::Storage;
use crate::tree;

/// Mount point handed to adapters unless the host sets one
pub const DEFAULT_CONTAINER: &str = "prism-editor";

pub struct EditorOrchestrator {
    config: Config,
    registry: Arc<AdapterRegistry>,
    settings: RuntimeSettings,
    container: String,
    scene: Option<SceneTemplate>,

    document: Document,
    selection: Selection,
    history: Arc<Mutex<HistoryManager>>,

    adapter: Option<ManagedAdapter>,
    events: Option<EventStream>,
    sink: Option<EventSink>,
    focused: bool,
    last_adapter_error: Option<AdapterError>,

    text_changes: Debouncer<NodeId, String>,
    selection_changes: Throttler<Selection>,
    auto_save: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl std::fmt::Debug for EditorOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorOrchestrator")
            .field("document", &self.document.id)
            .field("adapter", &self.adapter)
            .field("scene", &self.scene)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

fn lock(history: &Mutex<HistoryManager>) -> MutexGuard<'_, HistoryManager> {
    history.lock().unwrap_or_else(|e| e.into_inner())
}

impl EditorOrchestrator {
    /// Create an editor with an empty document and no active view
    pub fn new(config: Config, registry: Arc<AdapterRegistry>) -> Self {
        let settings = RuntimeSettings::from_config(&config);
        let history = HistoryManager::new(config.history.clone());
        Self {
            text_changes: Debouncer::new(config.input.content_debounce()),
            selection_changes: Throttler::new(config.input.selection_throttle()),
            config,
            registry,
            settings,
            container: DEFAULT_CONTAINER.to_string(),
            scene: None,
            document: Document::new(),
            selection: Selection::empty(),
            history: Arc::new(Mutex::new(history)),
            adapter: None,
            events: None,
            sink: None,
            focused: false,
            last_adapter_error: None,
            auto_save: None,
            destroyed: false,
        }
    }

    pub fn with_storage(self, storage: Arc<dyn Storage>) -> Self {
        lock(&self.history).set_storage(storage);
        self
    }

    /// Provider used by views that declare AI support
    pub fn with_ai_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.settings = std::mem::take(&mut self.settings).with_ai_provider(provider);
        self
    }

    pub fn with_scene(mut self, scene: SceneTemplate) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Scene used for recommendations and snapshot tags
    pub fn scene(&self) -> SceneTemplate {
        self.scene_hint().unwrap_or(self.config.default_scene)
    }

    fn scene_hint(&self) -> Option<SceneTemplate> {
        self.scene.or(self.document.metadata.scene_template)
    }

    fn ensure_live(&self) -> EditorResult<()> {
        if self.destroyed {
            return Err(EditorError::Destroyed);
        }
        Ok(())
    }

    // ==================== Content ====================

    pub fn get_content(&self) -> EditorResult<&Document> {
        self.ensure_live()?;
        Ok(&self.document)
    }

    /// Replace the whole document
    ///
    /// The incoming document must pass validation; the selection is pruned
    /// against it.
    pub fn set_content(&mut self, document: Document) -> EditorResult<()> {
        self.ensure_live()?;
        let report = tree::validate_ast(&document);
        if !report.valid {
            return Err(EditorError::InvalidStructure(report.errors.join("; ")));
        }
        self.flush_pending()?;

        self.document = document;
        self.text_changes.clear();
        self.render_view();
        self.reconcile_selection();
        self.record("set-content");
        info!(document = %self.document.id, nodes = tree::node_count(&self.document), "content replaced");
        Ok(())
    }

    /// Remove every block, keeping document identity and settings
    pub fn clear(&mut self) -> EditorResult<()> {
        self.ensure_live()?;
        self.text_changes.clear();
        self.selection_changes.clear();
        self.document = self.document.cleared();
        self.selection = Selection::empty();
        self.render_view();
        self.push_selection();
        self.record("clear");
        Ok(())
    }

    // ==================== Selection ====================

    pub fn get_selection(&self) -> EditorResult<&Selection> {
        self.ensure_live()?;
        Ok(&self.selection)
    }

    /// Set the selection from the host; stale ids are dropped
    ///
    /// Returns the selection actually applied.
    pub fn set_selection(&mut self, selection: Selection) -> EditorResult<Selection> {
        self.ensure_live()?;
        self.selection = selection.validate_against(&self.document);
        self.push_selection();
        Ok(self.selection.clone())
    }

    // ==================== Editing ====================

    /// Apply a structural edit
    ///
    /// Pending text changes are committed first so edits land in order.
    pub fn apply_edit(&mut self, edit: TreeEdit) -> EditorResult<()> {
        self.ensure_live()?;
        self.flush_text()?;
        self.commit(&edit, edit.operation())
    }

    pub fn add_node(
        &mut self,
        node: AstNode,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> EditorResult<NodeId> {
        let id = node.id.clone();
        self.apply_edit(TreeEdit::Add {
            node,
            parent_id: parent_id.map(str::to_string),
            index,
        })?;
        Ok(id)
    }

    pub fn remove_node(&mut self, node_id: &str) -> EditorResult<()> {
        self.apply_edit(TreeEdit::Remove {
            node_id: node_id.to_string(),
        })
    }

    pub fn update_node(&mut self, node_id: &str, patch: NodePatch) -> EditorResult<()> {
        self.apply_edit(TreeEdit::Update {
            node_id: node_id.to_string(),
            patch,
        })
    }

    pub fn move_node(
        &mut self,
        node_id: &str,
        new_parent_id: &str,
        new_index: usize,
    ) -> EditorResult<()> {
        self.apply_edit(TreeEdit::Move {
            node_id: node_id.to_string(),
            new_parent_id: new_parent_id.to_string(),
            new_index,
        })
    }

    /// Deep-copy a subtree with fresh ids; returns the copy's id
    pub fn duplicate_node(
        &mut self,
        node_id: &str,
        new_parent_id: Option<&str>,
    ) -> EditorResult<NodeId> {
        self.ensure_live()?;
        self.flush_text()?;
        let (next, copy_id) = tree::duplicate_node(&self.document, node_id, new_parent_id)?;
        self.document = next;
        self.render_view();
        self.record("duplicate-node");
        Ok(copy_id)
    }

    fn commit(&mut self, edit: &TreeEdit, operation: &str) -> EditorResult<()> {
        let next = edit.apply(&self.document)?;
        self.document = next;
        self.sync_view(edit);
        self.reconcile_selection();
        self.record(operation);
        debug!(operation, node = %edit.node_id(), "edit committed");
        Ok(())
    }

    // ==================== Views ====================

    pub fn active_view(&self) -> Option<ViewType> {
        self.adapter.as_ref().map(|a| a.view_type())
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.adapter.as_ref().map(|a| a.capabilities())
    }

    pub fn adapter_health(&self) -> Option<HealthReport> {
        self.adapter.as_ref().map(|a| a.health_check())
    }

    /// Most recent error reported by the view
    pub fn last_adapter_error(&self) -> Option<&AdapterError> {
        self.last_adapter_error.as_ref()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Sender for the active view's event channel
    ///
    /// Hosts that bridge native input into the editor send through this.
    pub fn event_sink(&self) -> Option<EventSink> {
        self.sink.clone()
    }

    pub async fn switch_editor(&mut self, view_type: ViewType) -> EditorResult<()> {
        self.switch_editor_with(view_type, &CreationToken::new(), |_| {})
            .await
    }

    /// Replace the active view
    ///
    /// The new adapter is created and rendered before the old one is torn
    /// down, so a failed or abandoned switch leaves the current view active.
    pub async fn switch_editor_with(
        &mut self,
        view_type: ViewType,
        token: &CreationToken,
        progress: impl FnMut(CreationProgress),
    ) -> EditorResult<()> {
        self.ensure_live()?;
        self.flush_pending()?;

        let (sink, stream) = event_channel();
        let mut options = AdapterOptions::new(self.container.clone()).with_events(sink.clone());
        options.theme = self.document.settings.theme.clone();

        let mut adapter = self
            .registry
            .create_adapter(view_type, options, &self.settings, token, progress)
            .await?;
        adapter.render(&self.document)?;
        if !self.selection.is_empty() {
            if let Err(e) = adapter.set_selection(&self.selection) {
                warn!(%view_type, error = %e, "selection not applied to new view");
            }
        }

        if !token.is_wanted() {
            adapter.destroy();
            return Err(EditorError::Cancelled(view_type));
        }

        let previous = self.adapter.replace(adapter);
        if let Some(mut previous) = previous {
            debug!(from = %previous.view_type(), to = %view_type, "tearing down previous view");
            previous.destroy();
        }
        // Events still queued from the old view are dropped with its stream
        self.events = Some(stream);
        self.sink = Some(sink);
        self.focused = false;
        self.document.metadata.view_type = Some(view_type);

        info!(%view_type, "switched editor");
        Ok(())
    }

    /// Views suited to the current scene, best first
    ///
    /// The active view is scored against its own health report.
    pub fn get_recommended_editors(&self) -> Vec<Recommendation> {
        let health = self
            .adapter
            .as_ref()
            .map(|adapter| (adapter.view_type(), adapter.health_check()));
        if let Some((view_type, report)) = health.as_ref().filter(|(_, r)| !r.healthy) {
            debug!(%view_type, score = report.score, "active view is unhealthy");
        }
        self.registry.get_recommended_types_with_health(
            self.scene(),
            health.as_ref().map(|(view_type, report)| (*view_type, report)),
        )
    }

    // ==================== History ====================

    /// Step back one snapshot; returns false at the oldest one
    pub fn undo(&mut self) -> EditorResult<bool> {
        self.ensure_live()?;
        self.flush_pending()?;
        let snapshot = lock(&self.history).undo();
        Ok(self.restore_from(snapshot))
    }

    /// Step forward one snapshot; returns false at the newest one
    pub fn redo(&mut self) -> EditorResult<bool> {
        self.ensure_live()?;
        self.flush_pending()?;
        let snapshot = lock(&self.history).redo();
        Ok(self.restore_from(snapshot))
    }

    pub fn can_undo(&self) -> bool {
        lock(&self.history).can_undo()
    }

    pub fn can_redo(&self) -> bool {
        lock(&self.history).can_redo()
    }

    pub fn history_stats(&self) -> HistoryStats {
        lock(&self.history).stats()
    }

    pub fn subscribe_history(&self) -> mpsc::UnboundedReceiver<HistoryEvent> {
        lock(&self.history).subscribe()
    }

    pub fn clear_history(&mut self) -> EditorResult<()> {
        self.ensure_live()?;
        lock(&self.history).clear_history();
        Ok(())
    }

    pub fn create_branch(&mut self, name: &str) -> EditorResult<String> {
        self.ensure_live()?;
        Ok(lock(&self.history).create_branch(name))
    }

    /// Make a stored branch the main history and restore its current state
    pub fn switch_branch(&mut self, id: &str) -> EditorResult<()> {
        self.ensure_live()?;
        self.flush_pending()?;
        let snapshot = lock(&self.history).switch_branch(id)?;
        self.restore_from(snapshot);
        Ok(())
    }

    pub fn list_branches(&self) -> Vec<BranchInfo> {
        lock(&self.history).list_branches()
    }

    /// Load the persisted history and restore its current snapshot
    ///
    /// Returns false when nothing was stored.
    pub fn restore_session(&mut self) -> EditorResult<bool> {
        self.ensure_live()?;
        let snapshot = {
            let mut history = lock(&self.history);
            if !history.load_from_storage()? {
                return Ok(false);
            }
            history.current()
        };
        self.restore_from(snapshot);
        Ok(true)
    }

    /// Commit pending input and persist the history
    pub fn end_session(&mut self) -> EditorResult<()> {
        self.ensure_live()?;
        self.flush_pending()?;
        lock(&self.history).end_session()?;
        Ok(())
    }

    /// Periodically persist the history from a background task
    ///
    /// Returns false when auto-save is off or no storage is attached.
    /// Must be called inside a tokio runtime.
    pub fn start_auto_save(&mut self) -> EditorResult<bool> {
        self.ensure_live()?;
        let interval = self.config.history.auto_save_interval();
        if !self.config.history.auto_save || !lock(&self.history).has_storage() {
            return Ok(false);
        }
        if interval.is_zero() {
            warn!("auto-save interval is zero; not starting timer");
            return Ok(false);
        }

        if let Some(task) = self.auto_save.take() {
            task.abort();
        }
        let history = Arc::clone(&self.history);
        self.auto_save = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let result = {
                    let mut history = lock(&history);
                    history.auto_save(Instant::now())
                };
                match result {
                    Ok(true) => debug!("history auto-saved"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "auto-save failed"),
                }
            }
        }));
        debug!(interval_secs = interval.as_secs(), "auto-save started");
        Ok(true)
    }

    fn record(&mut self, operation: &str) {
        let editor_type = self
            .active_view()
            .or(self.document.metadata.view_type)
            .unwrap_or(ViewType::RichText);
        let scene = self.scene_hint();
        lock(&self.history).add_snapshot(
            &self.document,
            &self.selection,
            editor_type,
            scene,
            operation,
        );
    }

    fn restore_from(&mut self, snapshot: Option<Arc<StateSnapshot>>) -> bool {
        let Some(snapshot) = snapshot else {
            return false;
        };
        self.document = snapshot.document.clone();
        self.selection = snapshot.selection.validate_against(&self.document);
        self.render_view();
        self.push_selection();
        debug!(snapshot = %snapshot.id, operation = %snapshot.operation(), "state restored");
        true
    }

    // ==================== Export ====================

    pub fn export_to_json(&self) -> EditorResult<String> {
        self.ensure_live()?;
        Ok(tree::serialize_pretty(&self.document)?)
    }

    pub fn export_to_html(&self) -> EditorResult<String> {
        self.ensure_live()?;
        Ok(export::to_html(&self.document))
    }

    pub fn export_to_markdown(&self) -> EditorResult<String> {
        self.ensure_live()?;
        Ok(export::to_markdown(&self.document))
    }

    // ==================== AI ====================

    pub async fn request_ai_completion(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> EditorResult<String> {
        let shim = self.ai_shim("AI completion")?;
        Ok(shim.request_completion(prompt, context).await?)
    }

    pub async fn request_ai_rewrite(&self, text: &str, instruction: &str) -> EditorResult<String> {
        let shim = self.ai_shim("AI rewrite")?;
        Ok(shim.request_rewrite(text, instruction).await?)
    }

    pub async fn request_ai_suggestions(&self, context: &str) -> EditorResult<Vec<String>> {
        let shim = self.ai_shim("AI suggestions")?;
        Ok(shim.request_suggestions(context).await?)
    }

    fn ai_shim(&self, capability: &'static str) -> EditorResult<Arc<AiShim>> {
        self.ensure_live()?;
        let adapter = self.adapter.as_ref().ok_or(EditorError::NoActiveAdapter)?;
        adapter
            .ai()
            .ok_or(EditorError::CapabilityUnavailable {
                view_type: adapter.view_type(),
                capability,
            })
    }

    // ==================== View sync ====================

    fn sync_view(&mut self, edit: &TreeEdit) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        let document = &self.document;
        let result = match edit {
            TreeEdit::Add {
                node,
                parent_id,
                index,
            } => match tree::find_node_by_id(document, &node.id) {
                Some(inserted) => adapter.add_node(inserted, parent_id.as_deref(), *index),
                None => adapter.render(document),
            },
            TreeEdit::Remove { node_id } => adapter.remove_node(node_id),
            TreeEdit::Update { node_id, .. } => match tree::find_node_by_id(document, node_id) {
                Some(updated) => adapter.update_node(updated),
                None => adapter.render(document),
            },
            TreeEdit::Move { .. } => adapter.render(document),
        };

        if let Err(e) = result {
            warn!(operation = edit.operation(), error = %e, "incremental view update failed; re-rendering");
            if let Err(e) = adapter.render(document) {
                warn!(error = %e, "view is stale");
            }
        }
    }

    fn render_view(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            if let Err(e) = adapter.render(&self.document) {
                warn!(error = %e, "view is stale");
            }
        }
    }

    fn push_selection(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            if let Err(e) = adapter.set_selection(&self.selection) {
                warn!(error = %e, "selection not applied to view");
            }
        }
    }

    fn reconcile_selection(&mut self) {
        let pruned = self.selection.validate_against(&self.document);
        if pruned != self.selection {
            debug!("pruned stale selection");
            self.selection = pruned;
            self.push_selection();
        }
    }

    // ==================== Lifecycle ====================

    /// Tear down the view, timers and channels; safe to call repeatedly
    ///
    /// Pending text changes are committed first.
    pub fn destroy(&mut self) {
        if self.destroyed {
            debug!("editor already destroyed");
            return;
        }
        if let Err(e) = self.flush_pending() {
            warn!(error = %e, "pending input dropped during destroy");
        }
        if let Some(task) = self.auto_save.take() {
            task.abort();
        }
        self.text_changes.clear();
        self.selection_changes.clear();
        if let Some(mut adapter) = self.adapter.take() {
            adapter.destroy();
        }
        self.events = None;
        self.sink = None;
        self.destroyed = true;
        info!(document = %self.document.id, "editor destroyed");
    }
}

impl Drop for EditorOrchestrator {
    fn drop(&mut self) {
        if let Some(task) = self.auto_save.take() {
            task.abort();
        }
    }
}
