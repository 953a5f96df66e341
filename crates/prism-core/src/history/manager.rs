use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{HistoryError, HistoryEvent, HistoryResult, HistoryState, StateChange, StateSnapshot};
use crate::adapter::{SceneTemplate, ViewType};
use crate::config::HistoryConfig;
use crate::document::Document;
use crate::selection::Selection;
use crate::storage::Storage;

/// Saved copy of a linear history
#[derive(Debug, Clone)]
struct Branch {
    name: String,
    created_at: DateTime<Utc>,
    history: Vec<Arc<StateSnapshot>>,
    current_index: Option<usize>,
}

/// Summary of a stored branch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub snapshot_count: usize,
}

/// History statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_snapshots: usize,
    pub current_index: Option<usize>,
    pub state: HistoryState,
    pub can_undo: bool,
    pub can_redo: bool,
    pub branch_count: usize,
    pub session_id: String,
    /// Snapshot count per operation tag
    pub operations: BTreeMap<String, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub last_saved_at: Option<DateTime<Utc>>,
}

/// Undo/redo stack with branching and persistence
pub struct HistoryManager {
    pub(super) history: Vec<Arc<StateSnapshot>>,
    pub(super) current_index: Option<usize>,
    pub(super) config: HistoryConfig,
    pub(super) session_id: String,
    branches: BTreeMap<String, Branch>,
    additions: usize,
    subscribers: Vec<mpsc::UnboundedSender<HistoryEvent>>,
    pub(super) storage: Option<Arc<dyn Storage>>,
    pub(super) last_saved: Option<Instant>,
    pub(super) last_saved_at: Option<DateTime<Utc>>,
    /// Changes since the last save
    pub(super) dirty: bool,
}

impl std::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("len", &self.history.len())
            .field("current_index", &self.current_index)
            .field("session_id", &self.session_id)
            .field("branches", &self.branches.len())
            .field("storage", &self.storage.is_some())
            .finish()
    }
}

impl HistoryManager {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            history: Vec::new(),
            current_index: None,
            config,
            session_id: format!("session-{}", Uuid::new_v4()),
            branches: BTreeMap::new(),
            additions: 0,
            subscribers: Vec::new(),
            storage: None,
            last_saved: None,
            last_saved_at: None,
            dirty: false,
        }
    }

    /// Attach a storage backend for save/load
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn set_storage(&mut self, storage: Arc<dyn Storage>) {
        self.storage = Some(storage);
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Receive history notifications; dropped receivers are pruned
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<HistoryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(super) fn emit(&mut self, event: HistoryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ==================== Recording ====================

    /// Record a new snapshot after a committed mutation
    ///
    /// Discards any redo future, appends, moves the cursor to the end, evicts
    /// from the front past `max_history_size`, and compresses every
    /// `compress_interval` additions.
    pub fn add_snapshot(
        &mut self,
        doc: &Document,
        selection: &Selection,
        editor_type: ViewType,
        scene_template: Option<SceneTemplate>,
        operation: &str,
    ) -> Arc<StateSnapshot> {
        let before = self.current();

        if let Some(index) = self.current_index {
            if index + 1 < self.history.len() {
                debug!(
                    discarded = self.history.len() - index - 1,
                    "truncating redo future"
                );
                self.history.truncate(index + 1);
            }
        }

        let snapshot = Arc::new(StateSnapshot::capture(
            doc,
            selection,
            editor_type,
            scene_template,
            operation,
            self.session_id.clone(),
        ));
        self.history.push(Arc::clone(&snapshot));

        let max = self.config.max_history_size.max(1);
        if self.history.len() > max {
            let excess = self.history.len() - max;
            self.history.drain(..excess);
        }
        self.current_index = Some(self.history.len() - 1);
        self.dirty = true;

        self.additions += 1;
        let interval = self.config.compress_interval;
        if interval > 0 && self.additions % interval == 0 {
            self.compress_history();
        }

        self.emit(HistoryEvent::StateChange(StateChange {
            before,
            after: Some(Arc::clone(&snapshot)),
            operation: operation.to_string(),
            timestamp: Utc::now(),
        }));
        snapshot
    }

    // ==================== Navigation ====================

    /// Step back; `None` at the oldest snapshot
    pub fn undo(&mut self) -> Option<Arc<StateSnapshot>> {
        let index = self.current_index?;
        if index == 0 {
            return None;
        }
        self.move_cursor(index - 1, "undo")
    }

    /// Step forward; `None` at the newest snapshot
    pub fn redo(&mut self) -> Option<Arc<StateSnapshot>> {
        let index = self.current_index?;
        if index + 1 >= self.history.len() {
            return None;
        }
        self.move_cursor(index + 1, "redo")
    }

    fn move_cursor(&mut self, index: usize, operation: &str) -> Option<Arc<StateSnapshot>> {
        let before = self.current();
        self.current_index = Some(index);
        let after = self.current();
        self.dirty = true;
        debug!(index, operation, "history cursor moved");

        self.emit(HistoryEvent::StateChange(StateChange {
            before,
            after: after.clone(),
            operation: operation.to_string(),
            timestamp: Utc::now(),
        }));
        after
    }

    pub fn current(&self) -> Option<Arc<StateSnapshot>> {
        self.current_index
            .and_then(|i| self.history.get(i))
            .map(Arc::clone)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.current_index, Some(i) if i > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.current_index, Some(i) if i + 1 < self.history.len())
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn snapshots(&self) -> &[Arc<StateSnapshot>] {
        &self.history
    }

    pub fn state(&self) -> HistoryState {
        match self.current_index {
            None => HistoryState::Empty,
            Some(i) if i + 1 == self.history.len() => HistoryState::Recording,
            Some(_) => HistoryState::Navigating,
        }
    }

    // ==================== Maintenance ====================

    /// Collapse runs of more than `compress_min_run` snapshots sharing an
    /// operation into the run's last snapshot
    ///
    /// The cursor stays on the newest snapshot if it was there; otherwise it
    /// follows its snapshot, or the surviving end of its run. Returns the
    /// number of snapshots removed.
    pub fn compress_history(&mut self) -> usize {
        let len = self.history.len();
        let min_run = self.config.compress_min_run;
        let mut keep = vec![true; len];

        let mut start = 0;
        while start < len {
            let mut end = start;
            while end + 1 < len
                && self.history[end + 1].operation() == self.history[start].operation()
            {
                end += 1;
            }
            if end - start + 1 > min_run {
                keep[start..end].iter_mut().for_each(|k| *k = false);
            }
            start = end + 1;
        }

        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }

        // Kept snapshots before each position give its new index
        let new_index_of = |pos: usize| keep[..pos].iter().filter(|k| **k).count();
        let new_cursor = self.current_index.map(|cur| {
            if cur + 1 == len {
                len - removed - 1
            } else {
                let survivor = (cur..len).find(|&i| keep[i]).unwrap_or(len - 1);
                new_index_of(survivor)
            }
        });

        let mut flags = keep.into_iter();
        self.history.retain(|_| flags.next().unwrap_or(true));
        self.current_index = new_cursor;
        self.dirty = true;

        debug!(removed, remaining = self.history.len(), "compressed history");
        self.emit(HistoryEvent::Compressed { removed });
        removed
    }

    /// Drop every snapshot and branch
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.current_index = None;
        self.branches.clear();
        self.additions = 0;
        self.dirty = true;
        info!("history cleared");
        self.emit(HistoryEvent::Cleared);
    }

    // ==================== Branches ====================

    /// Store a copy of the current linear history under a new branch id
    pub fn create_branch(&mut self, name: &str) -> String {
        let id = format!("branch-{}", Uuid::new_v4());
        self.branches.insert(
            id.clone(),
            Branch {
                name: name.to_string(),
                created_at: Utc::now(),
                history: self.history.clone(),
                current_index: self.current_index,
            },
        );
        info!(branch = %id, name, snapshots = self.history.len(), "branch created");
        self.emit(HistoryEvent::BranchCreated {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Replace the main history with a stored branch
    ///
    /// Returns the snapshot under the restored cursor.
    pub fn switch_branch(&mut self, id: &str) -> HistoryResult<Option<Arc<StateSnapshot>>> {
        let branch = self
            .branches
            .get(id)
            .ok_or_else(|| HistoryError::BranchNotFound(id.to_string()))?;

        let before = self.current();
        self.history = branch.history.clone();
        self.current_index = branch.current_index;
        self.dirty = true;
        let after = self.current();

        info!(branch = %id, "switched branch");
        self.emit(HistoryEvent::BranchSwitched { id: id.to_string() });
        self.emit(HistoryEvent::StateChange(StateChange {
            before,
            after: after.clone(),
            operation: "switch-branch".to_string(),
            timestamp: Utc::now(),
        }));
        Ok(after)
    }

    pub fn list_branches(&self) -> Vec<BranchInfo> {
        self.branches
            .iter()
            .map(|(id, branch)| BranchInfo {
                id: id.clone(),
                name: branch.name.clone(),
                created_at: branch.created_at,
                snapshot_count: branch.history.len(),
            })
            .collect()
    }

    pub fn delete_branch(&mut self, id: &str) -> bool {
        self.branches.remove(id).is_some()
    }

    // ==================== Stats ====================

    pub fn stats(&self) -> HistoryStats {
        let mut operations = BTreeMap::new();
        for snapshot in &self.history {
            *operations
                .entry(snapshot.operation().to_string())
                .or_insert(0) += 1;
        }

        HistoryStats {
            total_snapshots: self.history.len(),
            current_index: self.current_index,
            state: self.state(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            branch_count: self.branches.len(),
            session_id: self.session_id.clone(),
            operations,
            oldest: self.history.first().map(|s| s.timestamp),
            newest: self.history.last().map(|s| s.timestamp),
            last_saved_at: self.last_saved_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AstNode;
    use crate::tree;

    fn manager(max: usize) -> HistoryManager {
        HistoryManager::new(HistoryConfig {
            max_history_size: max,
            ..HistoryConfig::default()
        })
    }

    fn record(history: &mut HistoryManager, doc: &Document, operation: &str) -> Arc<StateSnapshot> {
        history.add_snapshot(
            doc,
            &Selection::empty(),
            ViewType::RichText,
            Some(SceneTemplate::Writing),
            operation,
        )
    }

    #[test]
    fn test_state_machine() {
        let mut history = manager(50);
        let doc = Document::new();
        assert_eq!(history.state(), HistoryState::Empty);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());

        record(&mut history, &doc, "a");
        assert_eq!(history.state(), HistoryState::Recording);
        record(&mut history, &doc, "b");

        history.undo().unwrap();
        assert_eq!(history.state(), HistoryState::Navigating);

        record(&mut history, &doc, "c");
        assert_eq!(history.state(), HistoryState::Recording);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_undo_redo_inverse() {
        let mut history = manager(50);
        let doc = Document::new();
        let n = 6;
        let ops: Vec<String> = (0..n).map(|i| format!("op-{}", i)).collect();
        let mut last = None;
        for op in &ops {
            last = Some(record(&mut history, &doc, op));
        }

        for _ in 0..n - 1 {
            assert!(history.undo().is_some());
        }
        assert_eq!(history.current().unwrap().operation(), "op-0");
        assert!(history.undo().is_none());
        assert_eq!(history.current_index(), Some(0));

        for _ in 0..n - 1 {
            assert!(history.redo().is_some());
        }
        assert!(Arc::ptr_eq(&history.current().unwrap(), last.as_ref().unwrap()));
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_new_snapshot_truncates_future() {
        let mut history = manager(50);
        let doc = Document::new();
        record(&mut history, &doc, "a");
        record(&mut history, &doc, "b");
        record(&mut history, &doc, "c");

        history.undo();
        history.undo();
        record(&mut history, &doc, "d");

        assert!(history.redo().is_none());
        let ops: Vec<_> = history.snapshots().iter().map(|s| s.operation()).collect();
        assert_eq!(ops, vec!["a", "d"]);
    }

    #[test]
    fn test_eviction_bound() {
        let mut history = manager(5);
        let doc = Document::new();
        for i in 0..8 {
            record(&mut history, &doc, &format!("op-{}", i));
        }
        assert_eq!(history.len(), 5);
        assert_eq!(history.current_index(), Some(4));
        assert_eq!(history.snapshots()[0].operation(), "op-3");
    }

    #[test]
    fn test_snapshots_are_independent_of_later_edits() {
        let mut history = manager(50);
        let doc = tree::add_node(&Document::new(), AstNode::paragraph("one"), None, None).unwrap();
        record(&mut history, &doc, "add-node");

        let id = doc.blocks()[0].id.clone();
        let edited = tree::update_node(&doc, &id, &crate::node::NodePatch::content("two")).unwrap();
        record(&mut history, &edited, "update-node");

        let first = history.undo().unwrap();
        assert_eq!(first.document.blocks()[0].content.as_deref(), Some("one"));
    }

    #[test]
    fn test_compress_collapses_long_runs() {
        let mut history = HistoryManager::new(HistoryConfig {
            compress_interval: 0,
            ..HistoryConfig::default()
        });
        let doc = Document::new();
        record(&mut history, &doc, "add-node");
        for _ in 0..7 {
            record(&mut history, &doc, "text-change");
        }
        for _ in 0..3 {
            record(&mut history, &doc, "select");
        }
        assert_eq!(history.len(), 11);

        let removed = history.compress_history();
        assert_eq!(removed, 6);
        let ops: Vec<_> = history.snapshots().iter().map(|s| s.operation()).collect();
        assert_eq!(ops, vec!["add-node", "text-change", "select", "select", "select"]);
        // Cursor stayed on the newest snapshot
        assert_eq!(history.current_index(), Some(4));
    }

    #[test]
    fn test_compress_cursor_follows_run_survivor() {
        let mut history = HistoryManager::new(HistoryConfig {
            compress_interval: 0,
            ..HistoryConfig::default()
        });
        let doc = Document::new();
        for _ in 0..6 {
            record(&mut history, &doc, "typing");
        }
        record(&mut history, &doc, "bold");
        let run_end = Arc::clone(&history.snapshots()[5]);

        // Park the cursor inside the run
        for _ in 0..4 {
            history.undo();
        }
        assert_eq!(history.current_index(), Some(2));

        history.compress_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history.current_index(), Some(0));
        assert!(Arc::ptr_eq(&history.current().unwrap(), &run_end));
    }

    #[test]
    fn test_periodic_compression() {
        let mut history = manager(50);
        let doc = Document::new();
        for _ in 0..10 {
            record(&mut history, &doc, "text-change");
        }
        // The 10th addition triggers compression of the 10-long run
        assert_eq!(history.len(), 1);
        assert_eq!(history.current_index(), Some(0));
    }

    #[test]
    fn test_branches() {
        let mut history = manager(50);
        let doc = Document::new();
        record(&mut history, &doc, "a");
        record(&mut history, &doc, "b");

        let id = history.create_branch("experiment");
        record(&mut history, &doc, "c");
        assert_eq!(history.len(), 3);

        let branches = history.list_branches();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "experiment");
        assert_eq!(branches[0].snapshot_count, 2);

        let current = history.switch_branch(&id).unwrap().unwrap();
        assert_eq!(current.operation(), "b");
        assert_eq!(history.len(), 2);

        assert!(matches!(
            history.switch_branch("missing"),
            Err(HistoryError::BranchNotFound(_))
        ));
        assert!(history.delete_branch(&id));
        assert!(!history.delete_branch(&id));
    }

    #[test]
    fn test_clear_history() {
        let mut history = manager(50);
        record(&mut history, &Document::new(), "a");
        history.create_branch("x");
        history.clear_history();

        assert!(history.is_empty());
        assert_eq!(history.state(), HistoryState::Empty);
        assert!(history.list_branches().is_empty());
    }

    #[test]
    fn test_stats() {
        let mut history = manager(50);
        let doc = Document::new();
        record(&mut history, &doc, "a");
        record(&mut history, &doc, "a");
        record(&mut history, &doc, "b");
        history.undo();

        let stats = history.stats();
        assert_eq!(stats.total_snapshots, 3);
        assert_eq!(stats.current_index, Some(1));
        assert_eq!(stats.state, HistoryState::Navigating);
        assert!(stats.can_undo && stats.can_redo);
        assert_eq!(stats.operations["a"], 2);
        assert!(stats.oldest <= stats.newest);
    }

    #[tokio::test]
    async fn test_subscribe_receives_state_changes() {
        let mut history = manager(50);
        let mut events = history.subscribe();
        let doc = Document::new();

        record(&mut history, &doc, "a");
        record(&mut history, &doc, "b");
        history.undo();

        let mut operations = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let HistoryEvent::StateChange(change) = event {
                operations.push(change.operation);
            }
        }
        assert_eq!(operations, vec!["a", "b", "undo"]);

        // Dropped receivers are pruned on the next emit
        drop(events);
        record(&mut history, &doc, "c");
        assert!(history.subscribers.is_empty());
    }
}
