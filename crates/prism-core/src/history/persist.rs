//! History persistence
//!
//! The history is stored as a single JSON blob:
//!
//! ```json
//! { "history": [...], "currentIndex": 3, "sessionId": "session-...", "timestamp": "..." }
//! ```
//!
//! `currentIndex` is `-1` for an empty history.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{HistoryError, HistoryEvent, HistoryManager, HistoryResult, StateSnapshot};
use crate::tree::validate_ast;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedHistoryRef<'a> {
    history: &'a [Arc<StateSnapshot>],
    current_index: i64,
    session_id: &'a str,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedHistory {
    history: Vec<Arc<StateSnapshot>>,
    current_index: i64,
    session_id: String,
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
}

impl HistoryManager {
    /// Write the history blob to the configured storage key
    pub fn save_to_storage(&mut self) -> HistoryResult<()> {
        let storage = self.storage.clone().ok_or(HistoryError::NoStorage)?;

        let blob = PersistedHistoryRef {
            history: &self.history,
            current_index: self.current_index.map(|i| i as i64).unwrap_or(-1),
            session_id: &self.session_id,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&blob)?;
        storage.set(&self.config.storage_key, &json)?;

        self.last_saved = Some(Instant::now());
        self.last_saved_at = Some(Utc::now());
        self.dirty = false;

        let snapshots = self.history.len();
        debug!(key = %self.config.storage_key, snapshots, bytes = json.len(), "history saved");
        self.emit(HistoryEvent::Saved { snapshots });
        Ok(())
    }

    /// Replace the in-memory history with the persisted blob
    ///
    /// Returns `Ok(false)` when nothing is stored. A payload that fails to
    /// parse or fails structural checks is removed from storage and reported
    /// as [`HistoryError::InvalidPayload`]; the in-memory history is left
    /// untouched in that case.
    pub fn load_from_storage(&mut self) -> HistoryResult<bool> {
        let storage = self.storage.clone().ok_or(HistoryError::NoStorage)?;
        let key = self.config.storage_key.clone();

        let Some(json) = storage.get(&key)? else {
            debug!(key = %key, "no persisted history");
            return Ok(false);
        };

        let blob = match serde_json::from_str::<PersistedHistory>(&json)
            .map_err(|e| e.to_string())
            .and_then(|blob| check_payload(&blob).map(|_| blob))
        {
            Ok(blob) => blob,
            Err(reason) => {
                warn!(key = %key, "discarding invalid persisted history: {}", reason);
                storage.remove(&key)?;
                return Err(HistoryError::InvalidPayload(reason));
            }
        };

        let mut history = blob.history;
        let mut current_index = usize::try_from(blob.current_index).ok();

        let max = self.config.max_history_size.max(1);
        if history.len() > max {
            let excess = history.len() - max;
            history.drain(..excess);
            current_index = current_index.map(|i| i.saturating_sub(excess));
        }

        let snapshots = history.len();
        self.history = history;
        self.current_index = current_index;
        self.dirty = false;

        info!(
            key = %key,
            snapshots,
            previous_session = %blob.session_id,
            "history loaded"
        );
        self.emit(HistoryEvent::Loaded { snapshots });
        Ok(true)
    }

    /// Save if auto-save is on, something changed, and the last save is
    /// older than the configured interval
    ///
    /// Returns whether a save happened.
    pub fn auto_save(&mut self, now: Instant) -> HistoryResult<bool> {
        if !self.config.auto_save || self.storage.is_none() || !self.dirty {
            return Ok(false);
        }
        if let Some(last) = self.last_saved {
            if now.saturating_duration_since(last) < self.config.auto_save_interval() {
                return Ok(false);
            }
        }
        self.save_to_storage()?;
        Ok(true)
    }

    /// Flush the history at session end regardless of the auto-save interval
    pub fn end_session(&mut self) -> HistoryResult<()> {
        if self.storage.is_none() {
            return Ok(());
        }
        info!(session = %self.session_id, "ending history session");
        self.save_to_storage()
    }
}

fn check_payload(blob: &PersistedHistory) -> Result<(), String> {
    let len = blob.history.len() as i64;
    let index_ok = if len == 0 {
        blob.current_index == -1
    } else {
        (0..len).contains(&blob.current_index)
    };
    if !index_ok {
        return Err(format!(
            "currentIndex {} out of range for {} snapshots",
            blob.current_index, len
        ));
    }

    for (i, snapshot) in blob.history.iter().enumerate() {
        if snapshot.id.is_empty() {
            return Err(format!("snapshot {} has an empty id", i));
        }
        let report = validate_ast(&snapshot.document);
        if !report.valid {
            return Err(format!(
                "snapshot {} holds an invalid document: {}",
                i,
                report.errors.join("; ")
            ));
        }
    }
    Ok(())
}
