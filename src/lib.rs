//! Append-only session log store with checkpoint rewind.
//!
//! Sessions are newline-delimited JSON logs whose records form a
//! parent-pointer tree; the last appended record is the head of the active
//! transcript. The store can list a project's sessions, rebuild the visible
//! transcript for one of them, and rewind a session to an earlier message —
//! reverting any file mutations the discarded tail's tools performed.
//!
//! ## Storage Structure
//!
//! ```text
//! ~/.cc-rewind/projects/
//!   -home-you-project-a/
//!     0b51e4a2-....jsonl                  # session log
//!     .cc-rewind/snapshots/
//!       0b51e4a2-....jsonl                # pre-mutation file states
//! ```

pub mod catalog;
pub mod checkpoint;
pub mod error;
pub mod logfile;
pub mod paths;
pub mod record;
pub mod snapshot;
pub mod transcript;

use std::path::{Path, PathBuf};

use tracing::warn;

pub use crate::catalog::SessionInfo;
pub use crate::error::RewindError;
pub use crate::record::{LogRecord, RecordKind};
pub use crate::snapshot::{RestoreReport, SnapshotKind, WorkspaceSnapshotEntry};
pub use crate::transcript::{Role, VisibleMessage};

use crate::catalog::SessionCatalog;
use crate::checkpoint::CheckpointManager;
use crate::paths::StorePaths;
use crate::snapshot::SnapshotStore;

// =============================================================================
// Session Store
// =============================================================================

/// Process-wide handle over the session logs and snapshot logs of one
/// config root. The catalog cache lives here; rewinds invalidate it through
/// the same handle.
pub struct SessionStore {
    paths: StorePaths,
    catalog: SessionCatalog,
    snapshots: SnapshotStore,
}

impl SessionStore {
    /// Store rooted at `$CC_REWIND_HOME`, falling back to `~/.cc-rewind`.
    pub fn new() -> Result<Self, RewindError> {
        Ok(Self::with_paths(StorePaths::from_env()?))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::with_paths(StorePaths::new(root))
    }

    fn with_paths(paths: StorePaths) -> Self {
        Self {
            catalog: SessionCatalog::new(paths.clone()),
            snapshots: SnapshotStore::new(paths.clone()),
            paths,
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Sessions recorded for `cwd`, most recently modified first.
    pub fn list_sessions(&self, cwd: &Path) -> Result<Vec<SessionInfo>, RewindError> {
        self.catalog.list(cwd)
    }

    /// The visible transcript of a session, identified by id or by a direct
    /// path to its log file.
    ///
    /// Degrades to an empty transcript on any internal failure; a broken log
    /// should never take down the caller's listing UI.
    pub fn get_session(&self, session: &str, cwd: &Path) -> Vec<VisibleMessage> {
        let (log_path, _) = match self.resolve_session(session, cwd) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(session, error = %e, "could not resolve session");
                return Vec::new();
            }
        };
        match logfile::read_records::<LogRecord>(&log_path) {
            Ok(records) => transcript::visible_messages(transcript::build_chain(&records)),
            Err(e) => {
                warn!(path = %log_path.display(), error = %e, "could not read session log");
                Vec::new()
            }
        }
    }

    /// Rewind a session to just before the visible message at
    /// `message_index`, undoing file mutations from the discarded tail.
    /// Returns the retained visible prefix.
    ///
    /// Unlike the read paths this propagates errors: silently failing a
    /// rewind would let the caller believe discarded messages were restored.
    pub fn restore_checkpoint(
        &self,
        session: &str,
        cwd: &Path,
        message_index: usize,
    ) -> Result<Vec<VisibleMessage>, RewindError> {
        let (log_path, session_id) = self.resolve_session(session, cwd)?;
        CheckpointManager::new(&self.catalog, &self.snapshots).restore(
            &log_path,
            cwd,
            &session_id,
            message_index,
        )
    }

    /// Append one record to its session's log.
    pub fn append_record(&self, cwd: &Path, record: &LogRecord) -> Result<(), RewindError> {
        let log_path = self.paths.session_log(cwd, &record.session_id);
        logfile::append_record(&log_path, record)?;
        Ok(())
    }

    /// Capture a file's pre-mutation state. The tool-execution layer calls
    /// this before running a mutating tool.
    pub fn record_snapshot(
        &self,
        cwd: &Path,
        session_id: &str,
        tool_use_id: &str,
        tool_name: &str,
        file_path: &Path,
    ) -> Result<WorkspaceSnapshotEntry, RewindError> {
        Ok(self
            .snapshots
            .record(cwd, session_id, tool_use_id, tool_name, file_path)?)
    }

    /// Accept a session id (path derived from `cwd`) or a direct log path.
    fn resolve_session(&self, session: &str, cwd: &Path) -> Result<(PathBuf, String), RewindError> {
        let as_path = Path::new(session);
        if as_path.extension().is_some_and(|ext| ext == paths::LOG_EXT) {
            let id = as_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .filter(|s| paths::is_valid_session_id(s))
                .ok_or_else(|| RewindError::InvalidSessionId(session.to_string()))?;
            return Ok((as_path.to_path_buf(), id));
        }

        if !paths::is_valid_session_id(session) {
            return Err(RewindError::InvalidSessionId(session.to_string()));
        }
        Ok((self.paths.session_log(cwd, session), session.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
