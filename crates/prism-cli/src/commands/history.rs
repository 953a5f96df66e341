//! History command handlers
//!
//! The history lives in the configured data directory as a single blob, so
//! every command opens a fresh editor, restores the session, acts, and ends
//! the session again.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use prism_core::{
    headless_registry, Config, EditorOrchestrator, FileStorage, HistoryManager, Storage, ViewType,
};

use super::{read_document, write_or_print};
use crate::output::Output;

fn storage(config: &Config) -> Arc<FileStorage> {
    Arc::new(FileStorage::new(config.history_dir()))
}

/// Open an editor bound to the persisted history
fn open_session(config: Config) -> Result<(EditorOrchestrator, bool)> {
    let storage = storage(&config);
    let mut editor =
        EditorOrchestrator::new(config, Arc::new(headless_registry())).with_storage(storage);
    let restored = editor
        .restore_session()
        .context("Failed to restore history")?;
    Ok((editor, restored))
}

fn close_session(mut editor: EditorOrchestrator) -> Result<()> {
    editor.end_session().context("Failed to save history")?;
    editor.destroy();
    Ok(())
}

/// List the persisted snapshots
pub fn show(config: Config, output: &Output) -> Result<()> {
    let storage = storage(&config);
    let mut history = HistoryManager::new(config.history.clone()).with_storage(storage);
    history
        .load_from_storage()
        .context("Failed to load history")?;

    output.print_history(&history.stats(), history.snapshots())
}

/// Record a document file as the newest snapshot
pub async fn record(
    config: Config,
    path: &Path,
    view: Option<ViewType>,
    output: &Output,
) -> Result<()> {
    let doc = read_document(path)?;
    let (mut editor, _) = open_session(config)?;

    if let Some(view) = view {
        editor
            .switch_editor(view)
            .await
            .with_context(|| format!("Failed to open the {} view", view))?;
    }
    editor
        .set_content(doc)
        .with_context(|| format!("Failed to open document: {:?}", path))?;

    let total = editor.history_stats().total_snapshots;
    close_session(editor)?;

    output.success(&format!("Recorded {} ({} snapshot(s))", path.display(), total));
    Ok(())
}

/// Step the persisted history back one snapshot
pub fn undo(config: Config, output: &Output) -> Result<()> {
    step(config, output, true)
}

/// Step the persisted history forward one snapshot
pub fn redo(config: Config, output: &Output) -> Result<()> {
    step(config, output, false)
}

fn step(config: Config, output: &Output, back: bool) -> Result<()> {
    let (mut editor, restored) = open_session(config)?;
    if !restored {
        output.message("No history recorded.");
        return Ok(());
    }

    let stepped = if back { editor.undo() } else { editor.redo() };
    let moved = stepped.context("History step failed")?;
    let index = editor.history_stats().current_index;
    close_session(editor)?;

    let verb = if back { "undo" } else { "redo" };
    match (moved, index) {
        (true, Some(index)) => output.success(&format!("{}: now at snapshot {}", verb, index)),
        _ => output.message(&format!("Nothing to {}.", verb)),
    }
    Ok(())
}

/// Write the document held by the current snapshot
pub fn restore(config: Config, out: Option<&Path>, output: &Output) -> Result<()> {
    let (mut editor, restored) = open_session(config)?;
    if !restored {
        bail!("No history recorded");
    }

    let json = editor.export_to_json().context("Failed to export document")?;
    editor.destroy();
    write_or_print(out, &json)?;

    if let Some(out) = out {
        output.success(&format!("Restored document to {}", out.display()));
    }
    Ok(())
}

/// Delete the persisted history
pub fn clear(config: Config, output: &Output) -> Result<()> {
    storage(&config)
        .remove(&config.history.storage_key)
        .context("Failed to clear history")?;
    output.success("History cleared");
    Ok(())
}
