//! View event routing and input timers

use std::time::Instant;

use tracing::{debug, warn};

use super::EditorOrchestrator;
use crate::adapter::{AdapterEvent, TreeEdit};
use crate::error::{EditorError, EditorResult};
use crate::node::NodePatch;
use crate::selection::Selection;
use crate::tree;

impl EditorOrchestrator {
    pub fn handle_event(&mut self, event: AdapterEvent) -> EditorResult<()> {
        self.handle_event_at(event, Instant::now())
    }

    /// Route one view event as if it arrived at `now`
    ///
    /// Text changes and selection changes only enter the rate limiters here;
    /// they are committed by [`flush_due`](Self::flush_due).
    pub fn handle_event_at(&mut self, event: AdapterEvent, now: Instant) -> EditorResult<()> {
        self.ensure_live()?;
        debug!(event = event.name(), "view event");

        match event {
            AdapterEvent::NodeClick { node_id } | AdapterEvent::EdgeClick { edge_id: node_id } => {
                if tree::find_node_by_id(&self.document, &node_id).is_none() {
                    return Err(EditorError::NotFound(node_id));
                }
                self.selection = Selection::nodes([node_id]);
            }
            AdapterEvent::NodeDoubleClick { node_id } => {
                debug!(node = %node_id, "node opened for editing");
            }
            AdapterEvent::SelectionChange { selection } => {
                let selection = selection.validate_against(&self.document);
                self.selection = selection.clone();
                if self.selection_changes.offer(selection, now).is_some() {
                    self.record("selection-change");
                }
            }
            AdapterEvent::ViewChange { tag, payload } => {
                debug!(%tag, %payload, "view state changed");
            }
            AdapterEvent::Focus => self.focused = true,
            AdapterEvent::Blur => self.focused = false,
            AdapterEvent::TextChange { node_id, text } => {
                if tree::find_node_by_id(&self.document, &node_id).is_none() {
                    return Err(EditorError::NotFound(node_id));
                }
                self.text_changes.push(node_id, text, now);
            }
            AdapterEvent::Error { error } => {
                warn!(
                    kind = %error.kind,
                    severity = ?error.severity,
                    operation = %error.operation,
                    "view reported error: {}",
                    error.message
                );
                self.last_adapter_error = Some(error);
            }
            AdapterEvent::NodeDrag { node_id, position } => {
                self.flush_text()?;
                let edit = TreeEdit::Update {
                    node_id,
                    patch: NodePatch::position(position),
                };
                self.commit(&edit, "node-drag")?;
            }
            AdapterEvent::Edit { edit } => {
                self.flush_text()?;
                self.commit(&edit, edit.operation())?;
            }
        }
        Ok(())
    }

    pub fn pump_events(&mut self) -> EditorResult<usize> {
        self.pump_events_at(Instant::now())
    }

    /// Drain the active view's event queue, then commit due input
    ///
    /// Every queued event is handled even if some fail; the first failure
    /// is returned. Returns the number of events drained.
    pub fn pump_events_at(&mut self, now: Instant) -> EditorResult<usize> {
        self.ensure_live()?;

        let mut received = Vec::new();
        if let Some(stream) = self.events.as_mut() {
            while let Ok(event) = stream.try_recv() {
                received.push(event);
            }
        }

        let count = received.len();
        let mut first_error = None;
        for event in received {
            if let Err(e) = self.handle_event_at(event, now) {
                warn!(error = %e, "view event rejected");
                first_error.get_or_insert(e);
            }
        }
        self.flush_due(now)?;

        match first_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    /// Commit debounced text and trailing selection changes that are due
    ///
    /// Returns the number of snapshots recorded.
    pub fn flush_due(&mut self, now: Instant) -> EditorResult<usize> {
        self.ensure_live()?;
        let mut recorded = 0;
        for (node_id, text) in self.text_changes.take_due(now) {
            recorded += self.commit_text(node_id, text)?;
        }
        if let Some(selection) = self.selection_changes.take_due(now) {
            self.commit_selection(selection);
            recorded += 1;
        }
        Ok(recorded)
    }

    /// Earliest instant at which [`flush_due`](Self::flush_due) has work
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.text_changes.next_deadline(),
            self.selection_changes.next_deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Commit all pending input regardless of timers
    pub(super) fn flush_pending(&mut self) -> EditorResult<()> {
        self.flush_text()?;
        if let Some(selection) = self.selection_changes.flush() {
            self.commit_selection(selection);
        }
        Ok(())
    }

    pub(super) fn flush_text(&mut self) -> EditorResult<()> {
        for (node_id, text) in self.text_changes.flush_all() {
            self.commit_text(node_id, text)?;
        }
        Ok(())
    }

    fn commit_text(&mut self, node_id: String, text: String) -> EditorResult<usize> {
        if tree::find_node_by_id(&self.document, &node_id).is_none() {
            debug!(node = %node_id, "dropping text change for removed node");
            return Ok(0);
        }
        let edit = TreeEdit::Update {
            node_id,
            patch: NodePatch::content(text),
        };
        self.commit(&edit, "text-change")?;
        Ok(1)
    }

    fn commit_selection(&mut self, selection: Selection) {
        self.selection = selection.validate_against(&self.document);
        self.record("selection-change");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::adapter::{AdapterError, SceneTemplate, ViewType};
    use crate::config::Config;
    use crate::node::{AstNode, Position};
    use crate::registry::headless_registry;
    use crate::selection::TextRange;

    const MS: Duration = Duration::from_millis(1);

    async fn ready_editor() -> (EditorOrchestrator, String) {
        let mut editor = EditorOrchestrator::new(Config::default(), Arc::new(headless_registry()))
            .with_scene(SceneTemplate::Writing);
        editor.switch_editor(ViewType::RichText).await.unwrap();
        let id = editor
            .add_node(AstNode::paragraph(""), None, None)
            .unwrap();
        (editor, id)
    }

    fn content_of(editor: &EditorOrchestrator, id: &str) -> Option<String> {
        tree::find_node_by_id(editor.get_content().unwrap(), id).and_then(|n| n.content.clone())
    }

    #[tokio::test]
    async fn test_text_changes_debounced_into_one_snapshot() {
        let (mut editor, id) = ready_editor().await;
        let sink = editor.event_sink().unwrap();
        let t0 = Instant::now();

        for (i, text) in ["H", "He", "Hel", "Hello"].iter().enumerate() {
            sink.send(AdapterEvent::TextChange {
                node_id: id.clone(),
                text: text.to_string(),
            })
            .unwrap();
            editor.pump_events_at(t0 + (i as u32) * 30 * MS).unwrap();
        }
        assert_eq!(content_of(&editor, &id).as_deref(), Some(""));
        assert_eq!(editor.next_deadline(), Some(t0 + 190 * MS));

        assert_eq!(editor.flush_due(t0 + 150 * MS).unwrap(), 0);
        assert_eq!(editor.flush_due(t0 + 190 * MS).unwrap(), 1);
        assert_eq!(content_of(&editor, &id).as_deref(), Some("Hello"));
        assert_eq!(editor.history_stats().operations["text-change"], 1);
    }

    #[tokio::test]
    async fn test_structural_edit_flushes_pending_text() {
        let (mut editor, id) = ready_editor().await;
        let t0 = Instant::now();
        editor
            .handle_event_at(
                AdapterEvent::TextChange {
                    node_id: id.clone(),
                    text: "typed".to_string(),
                },
                t0,
            )
            .unwrap();

        let extra = AstNode::paragraph("next");
        editor
            .handle_event_at(
                AdapterEvent::Edit {
                    edit: TreeEdit::Add {
                        node: extra,
                        parent_id: None,
                        index: None,
                    },
                },
                t0 + MS,
            )
            .unwrap();

        assert_eq!(content_of(&editor, &id).as_deref(), Some("typed"));
        assert!(editor.next_deadline().is_none());
        let stats = editor.history_stats();
        assert_eq!(stats.operations["text-change"], 1);
        assert_eq!(stats.operations["add-node"], 2);
    }

    #[tokio::test]
    async fn test_undo_commits_pending_text_first() {
        let (mut editor, id) = ready_editor().await;
        editor
            .handle_event(AdapterEvent::TextChange {
                node_id: id.clone(),
                text: "pending".to_string(),
            })
            .unwrap();

        assert!(editor.undo().unwrap());
        assert_eq!(content_of(&editor, &id).as_deref(), Some(""));
        assert!(editor.redo().unwrap());
        assert_eq!(content_of(&editor, &id).as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn test_selection_changes_throttled() {
        let (mut editor, id) = ready_editor().await;
        let t0 = Instant::now();
        let select = |start| AdapterEvent::SelectionChange {
            selection: Selection::text(TextRange::new(id.clone(), start, start)),
        };

        editor.handle_event_at(select(0), t0).unwrap();
        editor.handle_event_at(select(1), t0 + 10 * MS).unwrap();
        editor.handle_event_at(select(2), t0 + 20 * MS).unwrap();
        assert_eq!(editor.history_stats().operations["selection-change"], 1);
        // The live selection tracks every event
        assert!(editor.get_selection().unwrap().contains(&id));

        assert_eq!(editor.flush_due(t0 + 50 * MS).unwrap(), 1);
        assert_eq!(editor.history_stats().operations["selection-change"], 2);
        assert_eq!(editor.flush_due(t0 + 200 * MS).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_text_change_for_unknown_node_rejected() {
        let (mut editor, _) = ready_editor().await;
        let err = editor
            .handle_event(AdapterEvent::TextChange {
                node_id: "ghost".to_string(),
                text: "x".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, EditorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_text_for_removed_node_dropped() {
        let (mut editor, id) = ready_editor().await;
        let t0 = Instant::now();
        editor
            .handle_event_at(
                AdapterEvent::TextChange {
                    node_id: id.clone(),
                    text: "late".to_string(),
                },
                t0,
            )
            .unwrap();
        // Removal commits the pending text before removing the node
        editor.remove_node(&id).unwrap();
        assert_eq!(editor.flush_due(t0 + 500 * MS).unwrap(), 0);
        assert!(editor.get_content().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clicks_drag_and_focus() {
        let (mut editor, id) = ready_editor().await;
        let sink = editor.event_sink().unwrap();

        sink.send(AdapterEvent::Focus).unwrap();
        sink.send(AdapterEvent::NodeClick {
            node_id: id.clone(),
        })
        .unwrap();
        sink.send(AdapterEvent::NodeDrag {
            node_id: id.clone(),
            position: Position::new(10.0, 20.0),
        })
        .unwrap();
        assert_eq!(editor.pump_events().unwrap(), 3);

        assert!(editor.is_focused());
        assert_eq!(editor.get_selection().unwrap().node_ids, vec![id.clone()]);
        let node = tree::find_node_by_id(editor.get_content().unwrap(), &id).unwrap();
        assert_eq!(node.position.as_ref().map(|p| p.x), Some(10.0));
        assert_eq!(editor.history_stats().operations["node-drag"], 1);
    }

    #[tokio::test]
    async fn test_pump_reports_first_failure_but_handles_all() {
        let (mut editor, id) = ready_editor().await;
        let sink = editor.event_sink().unwrap();

        sink.send(AdapterEvent::NodeClick {
            node_id: "ghost".to_string(),
        })
        .unwrap();
        sink.send(AdapterEvent::Error {
            error: AdapterError::new("render", "canvas lost"),
        })
        .unwrap();
        sink.send(AdapterEvent::NodeClick {
            node_id: id.clone(),
        })
        .unwrap();

        let err = editor.pump_events().unwrap_err();
        assert!(matches!(err, EditorError::NotFound(ref missing) if missing == "ghost"));
        assert_eq!(editor.last_adapter_error().unwrap().message, "canvas lost");
        assert_eq!(editor.get_selection().unwrap().node_ids, vec![id]);
    }

    #[tokio::test]
    async fn test_old_view_events_dropped_after_switch() {
        let (mut editor, id) = ready_editor().await;
        let old_sink = editor.event_sink().unwrap();
        old_sink
            .send(AdapterEvent::NodeClick {
                node_id: id.clone(),
            })
            .unwrap();

        editor.switch_editor(ViewType::Table).await.unwrap();
        assert!(old_sink.send(AdapterEvent::Focus).is_err());
        assert_eq!(editor.pump_events().unwrap(), 0);
        assert!(editor.get_selection().unwrap().is_empty());
    }
}
