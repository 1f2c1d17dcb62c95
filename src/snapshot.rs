//! Workspace file snapshots.
//!
//! Before a mutating tool touches a file, the tool-execution layer records
//! the file's pre-mutation state here, keyed by the tool invocation id. A
//! checkpoint rewind later replays those states in reverse to undo the
//! mutations. Snapshot logs are append-only; duplicates for the same
//! invocation id fold last-write-wins.
//!
//! Restore is best-effort by contract: it runs as a side effect of a rewind,
//! and one unreadable or permission-denied file must not block the rest.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::logfile;
use crate::paths::StorePaths;
use crate::record::now_timestamp;

// =============================================================================
// Snapshot Entries
// =============================================================================

/// What the file looked like when the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Regular file; `content` holds its full text.
    File,
    /// No filesystem object at the path.
    Missing,
    /// Directory, symlink, fifo, etc. Restore is a no-op.
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshotEntry {
    pub session_id: String,
    pub tool_use_id: String,
    pub tool_name: String,
    pub file_path: PathBuf,
    pub timestamp: String,
    pub kind: SnapshotKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Aggregate outcome of a bulk restore. Individual failures are counted,
/// never raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub missing: usize,
    pub errors: usize,
}

// =============================================================================
// Snapshot Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    paths: StorePaths,
}

impl SnapshotStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    /// Capture the current on-disk state of `file_path` and append it to the
    /// session's snapshot log.
    pub fn record(
        &self,
        cwd: &Path,
        session_id: &str,
        tool_use_id: &str,
        tool_name: &str,
        file_path: &Path,
    ) -> io::Result<WorkspaceSnapshotEntry> {
        let (kind, content) = inspect(file_path)?;
        let entry = WorkspaceSnapshotEntry {
            session_id: session_id.to_string(),
            tool_use_id: tool_use_id.to_string(),
            tool_name: tool_name.to_string(),
            file_path: file_path.to_path_buf(),
            timestamp: now_timestamp(),
            kind,
            content,
        };

        let log = self.paths.snapshot_log(cwd, session_id);
        logfile::append_record(&log, &entry)?;
        Ok(entry)
    }

    /// Read the full snapshot log into a lookup map, last write winning per
    /// tool invocation id.
    pub fn load_index(
        &self,
        cwd: &Path,
        session_id: &str,
    ) -> io::Result<HashMap<String, WorkspaceSnapshotEntry>> {
        let log = self.paths.snapshot_log(cwd, session_id);
        let entries: Vec<WorkspaceSnapshotEntry> = logfile::read_records(&log)?;

        let mut index = HashMap::with_capacity(entries.len());
        for entry in entries {
            index.insert(entry.tool_use_id.clone(), entry);
        }
        Ok(index)
    }

    /// Apply the inverse of each snapshot, in the order given.
    ///
    /// Callers pass ids most-recent-first so sequential edits to the same
    /// file unwind correctly.
    pub fn restore(
        &self,
        cwd: &Path,
        session_id: &str,
        tool_use_ids: &[String],
    ) -> RestoreReport {
        let index = match self.load_index(cwd, session_id) {
            Ok(index) => index,
            Err(e) => {
                warn!(session = session_id, error = %e, "snapshot log unreadable; nothing restored");
                return RestoreReport {
                    errors: tool_use_ids.len(),
                    ..RestoreReport::default()
                };
            }
        };

        let mut report = RestoreReport::default();
        for id in tool_use_ids {
            let Some(entry) = index.get(id) else {
                debug!(tool_use_id = %id, "no snapshot recorded for invocation");
                report.missing += 1;
                continue;
            };
            match apply(entry) {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    warn!(
                        tool_use_id = %id,
                        path = %entry.file_path.display(),
                        error = %e,
                        "failed to restore file from snapshot"
                    );
                    report.errors += 1;
                }
            }
        }
        report
    }
}

/// Classify the filesystem object at `path`, reading content for regular
/// files. Symlinks are not followed: snapshotting the link target would
/// restore the wrong object.
fn inspect(path: &Path) -> io::Result<(SnapshotKind, Option<String>)> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => {
            let content = fs::read_to_string(path)?;
            Ok((SnapshotKind::File, Some(content)))
        }
        Ok(_) => Ok((SnapshotKind::Other, None)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok((SnapshotKind::Missing, None)),
        Err(e) => Err(e),
    }
}

/// Apply the inverse of one snapshot to the live filesystem.
fn apply(entry: &WorkspaceSnapshotEntry) -> io::Result<()> {
    match entry.kind {
        SnapshotKind::File => {
            if let Some(parent) = entry.file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&entry.file_path, entry.content.as_deref().unwrap_or(""))
        }
        SnapshotKind::Missing => {
            // The tool created this file; deleting it undoes that. It may
            // already be gone, and that is fine.
            if let Err(e) = fs::remove_file(&entry.file_path) {
                debug!(path = %entry.file_path.display(), error = %e, "delete-on-restore skipped");
            }
            Ok(())
        }
        SnapshotKind::Other => Ok(()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SESSION: &str = "0b51e4a2-93f4-4b13-8c1a-0f6f0a9d2e71";

    fn store(dir: &TempDir) -> SnapshotStore {
        SnapshotStore::new(StorePaths::new(dir.path().join("store")))
    }

    #[test]
    fn records_existing_file_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("notes.txt");
        fs::write(&target, "original words").unwrap();

        let entry = store(&dir)
            .record(dir.path(), SESSION, "toolu_01", "Write", &target)
            .unwrap();
        assert_eq!(entry.kind, SnapshotKind::File);
        assert_eq!(entry.content.as_deref(), Some("original words"));
    }

    #[test]
    fn records_missing_and_other_kinds() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let absent = dir.path().join("not-yet.txt");
        let entry = store
            .record(dir.path(), SESSION, "toolu_01", "Write", &absent)
            .unwrap();
        assert_eq!(entry.kind, SnapshotKind::Missing);
        assert!(entry.content.is_none());

        let subdir = dir.path().join("a-directory");
        fs::create_dir(&subdir).unwrap();
        let entry = store
            .record(dir.path(), SESSION, "toolu_02", "Edit", &subdir)
            .unwrap();
        assert_eq!(entry.kind, SnapshotKind::Other);
    }

    #[test]
    fn duplicate_tool_use_id_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let target = dir.path().join("file.txt");

        fs::write(&target, "first").unwrap();
        store
            .record(dir.path(), SESSION, "toolu_01", "Write", &target)
            .unwrap();
        fs::write(&target, "second").unwrap();
        store
            .record(dir.path(), SESSION, "toolu_01", "Write", &target)
            .unwrap();

        let index = store.load_index(dir.path(), SESSION).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index["toolu_01"].content.as_deref(), Some("second"));
    }

    #[test]
    fn restore_writes_back_exact_content() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let target = dir.path().join("src/config.rs");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "before\nedit\n").unwrap();

        store
            .record(dir.path(), SESSION, "toolu_01", "Edit", &target)
            .unwrap();
        fs::write(&target, "after the tool ran").unwrap();

        let report = store.restore(dir.path(), SESSION, &["toolu_01".to_string()]);
        assert_eq!(report, RestoreReport { restored: 1, missing: 0, errors: 0 });
        assert_eq!(fs::read_to_string(&target).unwrap(), "before\nedit\n");
    }

    #[test]
    fn restore_missing_kind_deletes_created_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let target = dir.path().join("created-by-tool.txt");

        store
            .record(dir.path(), SESSION, "toolu_01", "Write", &target)
            .unwrap();
        fs::write(&target, "tool output").unwrap();

        let report = store.restore(dir.path(), SESSION, &["toolu_01".to_string()]);
        assert_eq!(report.restored, 1);
        assert!(!target.exists());

        // Restoring again with the file already absent still succeeds.
        let report = store.restore(dir.path(), SESSION, &["toolu_01".to_string()]);
        assert_eq!(report.restored, 1);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn restore_other_kind_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let subdir = dir.path().join("keep-me");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("inner.txt"), "data").unwrap();

        store
            .record(dir.path(), SESSION, "toolu_01", "Write", &subdir)
            .unwrap();
        let report = store.restore(dir.path(), SESSION, &["toolu_01".to_string()]);

        assert_eq!(report.restored, 1);
        assert!(subdir.is_dir());
        assert_eq!(fs::read_to_string(subdir.join("inner.txt")).unwrap(), "data");
    }

    #[test]
    fn restore_recreates_deleted_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let target = dir.path().join("deep/nested/file.txt");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "content").unwrap();

        store
            .record(dir.path(), SESSION, "toolu_01", "Write", &target)
            .unwrap();
        fs::remove_dir_all(dir.path().join("deep")).unwrap();

        let report = store.restore(dir.path(), SESSION, &["toolu_01".to_string()]);
        assert_eq!(report.restored, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "content");
    }

    #[test]
    fn unknown_ids_count_as_missing_without_aborting() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let target = dir.path().join("real.txt");
        fs::write(&target, "snapshotted").unwrap();
        store
            .record(dir.path(), SESSION, "toolu_02", "Write", &target)
            .unwrap();
        fs::write(&target, "mutated").unwrap();

        let ids = vec!["toolu_99".to_string(), "toolu_02".to_string()];
        let report = store.restore(dir.path(), SESSION, &ids);

        assert_eq!(report, RestoreReport { restored: 1, missing: 1, errors: 0 });
        assert_eq!(fs::read_to_string(&target).unwrap(), "snapshotted");
    }

    #[test]
    fn sequential_edits_unwind_in_reverse_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let target = dir.path().join("file.txt");

        fs::write(&target, "v0").unwrap();
        store
            .record(dir.path(), SESSION, "toolu_01", "Edit", &target)
            .unwrap();
        fs::write(&target, "v1").unwrap();
        store
            .record(dir.path(), SESSION, "toolu_02", "Edit", &target)
            .unwrap();
        fs::write(&target, "v2").unwrap();

        // Most recent mutation first: toolu_02 puts back v1, toolu_01 puts back v0.
        let ids = vec!["toolu_02".to_string(), "toolu_01".to_string()];
        store.restore(dir.path(), SESSION, &ids);
        assert_eq!(fs::read_to_string(&target).unwrap(), "v0");
    }
}
