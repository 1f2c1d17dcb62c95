//! Checkpoint rewind.
//!
//! Rewinding a session to a visible message truncates the log to the state
//! before that message was sent ("put it back into the input box") and
//! undoes any file mutations the discarded tail performed, via the snapshot
//! store. Truncation is the authoritative step: snapshot-restore failures
//! are reported and logged but never block it.

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::SessionCatalog;
use crate::error::RewindError;
use crate::logfile;
use crate::record::{LogRecord, RecordKind};
use crate::snapshot::SnapshotStore;
use crate::transcript::{self, VisibleMessage};

/// Tool names whose invocations mutate workspace files and therefore have
/// snapshots to unwind.
pub const MUTATING_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

pub struct CheckpointManager<'a> {
    catalog: &'a SessionCatalog,
    snapshots: &'a SnapshotStore,
}

impl<'a> CheckpointManager<'a> {
    pub fn new(catalog: &'a SessionCatalog, snapshots: &'a SnapshotStore) -> Self {
        Self { catalog, snapshots }
    }

    /// Rewind the session log at `log_path` to just before the visible
    /// message at `message_index`. Returns the retained visible prefix.
    pub fn restore(
        &self,
        log_path: &Path,
        cwd: &Path,
        session_id: &str,
        message_index: usize,
    ) -> Result<Vec<VisibleMessage>, RewindError> {
        let records: Vec<LogRecord> = logfile::read_records(log_path)?;

        // Resolve the target through the visible projection of the chain.
        let chain = transcript::build_chain(&records);
        let visible: Vec<(&LogRecord, VisibleMessage)> = chain
            .iter()
            .filter_map(|r| transcript::visible_message(r).map(|m| (*r, m)))
            .collect();

        if message_index >= visible.len() {
            return Err(RewindError::InvalidIndex {
                requested: message_index,
                visible_len: visible.len(),
            });
        }
        let target = visible[message_index].0;

        // Map the target back to its raw append position.
        let target_raw = records
            .iter()
            .position(|r| std::ptr::eq(r, target))
            .ok_or_else(|| RewindError::UnresolvedTarget {
                uuid: target.uuid.clone(),
            })?;

        // Cut after the target's parent when it resolves, else one before the
        // target. Either way the target itself is discarded.
        let cut: Option<usize> = match target
            .parent_uuid
            .as_deref()
            .and_then(|p| records.iter().position(|r| r.uuid == p))
        {
            Some(parent_raw) => Some(parent_raw),
            None => target_raw.checked_sub(1),
        };
        let keep_len = cut.map_or(0, |c| c + 1);

        // Undo file mutations introduced by the discarded tail, most recent
        // first so sequential edits to one file unwind correctly.
        let mut tool_use_ids = mutating_tool_use_ids(&records[keep_len..]);
        if !tool_use_ids.is_empty() {
            tool_use_ids.reverse();
            let report = self.snapshots.restore(cwd, session_id, &tool_use_ids);
            if report.errors > 0 || report.missing > 0 {
                warn!(
                    session = session_id,
                    restored = report.restored,
                    missing = report.missing,
                    errors = report.errors,
                    "workspace restore was incomplete; continuing with truncation"
                );
            } else {
                info!(
                    session = session_id,
                    restored = report.restored,
                    "workspace mutations reverted"
                );
            }
        }

        // Never persist an empty log: the session would vanish from
        // listings. Leave a meta placeholder instead.
        let placeholder;
        let kept: &[LogRecord] = if keep_len == 0 {
            placeholder = [LogRecord::placeholder(
                session_id,
                cwd.to_string_lossy().to_string(),
            )];
            &placeholder
        } else {
            &records[..keep_len]
        };

        logfile::rewrite_records(log_path, kept).map_err(|source| RewindError::Persist {
            path: log_path.to_path_buf(),
            source,
        })?;
        self.catalog.invalidate(log_path);

        info!(
            session = session_id,
            message_index,
            kept = keep_len,
            discarded = records.len() - keep_len,
            "session rewound"
        );

        Ok(visible
            .into_iter()
            .take(message_index)
            .map(|(_, m)| m)
            .collect())
    }
}

/// Tool-invocation ids of mutating tools, in file order, from assistant
/// records' structured content.
fn mutating_tool_use_ids(records: &[LogRecord]) -> Vec<String> {
    let mut ids = Vec::new();
    for record in records {
        if record.kind != RecordKind::Assistant {
            continue;
        }
        let Some(blocks) = record.message.get("content").and_then(Value::as_array) else {
            continue;
        };
        for block in blocks {
            if block.get("type").and_then(Value::as_str) != Some("tool_use") {
                continue;
            }
            let name = block.get("name").and_then(Value::as_str).unwrap_or("");
            if !MUTATING_TOOLS.contains(&name) {
                continue;
            }
            if let Some(id) = block.get("id").and_then(Value::as_str) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

// =============================================================================
// Tests
// =============================================================================
