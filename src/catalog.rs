//! Session catalog: cheap, repeatable listing of a project's sessions.
//!
//! Listing scans the project's session directory, parsing each log file into
//! lightweight `SessionInfo` metadata. Results are cached against the file's
//! modification time so unchanged logs are never reparsed. The cache is owned
//! by the catalog and invalidated explicitly when a rewind rewrites a log;
//! mtime comparison alone cannot tell "we rewrote it" from "it is stale".

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::RewindError;
use crate::logfile;
use crate::paths::{self, StorePaths, LOG_EXT};
use crate::record::LogRecord;
use crate::transcript;

// =============================================================================
// Session Metadata
// =============================================================================

/// Derived per-session metadata. Computed on demand, never persisted.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub path: PathBuf,
    pub last_modified: SystemTime,
    pub message_count: usize,
    pub summary: String,
    pub is_sidechain: bool,
    /// Approximate worktree, taken from the first record's cwd.
    pub worktree: Option<String>,
}

struct CacheEntry {
    mtime: SystemTime,
    info: SessionInfo,
}

// =============================================================================
// Catalog
// =============================================================================

pub struct SessionCatalog {
    paths: StorePaths,
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl SessionCatalog {
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// List the sessions recorded for `cwd`, most recently modified first.
    ///
    /// An absent project directory is an empty listing; an unreadable one is
    /// an error. Individual unreadable or malformed files are skipped.
    pub fn list(&self, cwd: &Path) -> Result<Vec<SessionInfo>, RewindError> {
        let dir = self.paths.project_dir(cwd);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    // A failure at the root means the directory itself is
                    // unreadable, which callers need to distinguish from
                    // "no sessions".
                    if e.path() == Some(dir.as_path()) || e.depth() == 0 {
                        return Err(RewindError::Scan {
                            path: dir.clone(),
                            source: e.into(),
                        });
                    }
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == LOG_EXT)
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(paths::is_valid_session_id)
            {
                files.push(path.to_path_buf());
            }
        }

        // One independent read-and-parse task per file; the cache write for
        // each file is per-key and safe under concurrent listings.
        let mut sessions: Vec<SessionInfo> = files
            .par_iter()
            .filter_map(|path| match self.session_info(path) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable session log");
                    None
                }
            })
            .collect();

        sessions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(sessions)
    }

    /// Metadata for one session log, served from cache when the mtime is an
    /// exact match.
    fn session_info(&self, path: &Path) -> std::io::Result<SessionInfo> {
        let mtime = fs::metadata(path)?.modified()?;

        {
            let cache = self.cache.lock().expect("catalog cache poisoned");
            if let Some(entry) = cache.get(path) {
                if entry.mtime == mtime {
                    debug!(path = %path.display(), "catalog cache hit");
                    return Ok(entry.info.clone());
                }
            }
        }

        let info = load_session_info(path, mtime)?;
        self.cache.lock().expect("catalog cache poisoned").insert(
            path.to_path_buf(),
            CacheEntry {
                mtime,
                info: info.clone(),
            },
        );
        Ok(info)
    }

    /// Evict one log file's cache entry. Called after a rewrite.
    pub fn invalidate(&self, path: &Path) {
        let evicted = self
            .cache
            .lock()
            .expect("catalog cache poisoned")
            .remove(path)
            .is_some();
        debug!(path = %path.display(), evicted, "catalog cache invalidated");
    }
}

fn load_session_info(path: &Path, mtime: SystemTime) -> std::io::Result<SessionInfo> {
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let records: Vec<LogRecord> = logfile::read_records(path)?;
    let first = records.first();

    Ok(SessionInfo {
        id,
        path: path.to_path_buf(),
        last_modified: mtime,
        message_count: records.len(),
        summary: transcript::summarize(&records),
        is_sidechain: first.is_some_and(|r| r.is_sidechain),
        worktree: first.and_then(|r| r.cwd.clone()),
    })
}

// =============================================================================
// Tests
// =============================================================================
