//! Config-root resolution and on-disk layout.
//!
//! ```text
//! <root>/projects/
//!   -home-arthur-camelot/                      # encoded working directory
//!     0b51e4a2-....jsonl                       # session log
//!     .cc-rewind/snapshots/
//!       0b51e4a2-....jsonl                     # workspace snapshot log
//! ```
//!
//! `<root>` comes from `$CC_REWIND_HOME`, falling back to `~/.cc-rewind`.
//! The working-directory encoding replaces every character outside
//! `[A-Za-z0-9]` with `-`; it is used everywhere a path must be derived from
//! a working directory, so the mapping stays stable across components.

use std::env;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::RewindError;

pub const CONFIG_ROOT_ENV: &str = "CC_REWIND_HOME";
const DEFAULT_ROOT_DIR: &str = ".cc-rewind";
const SNAPSHOT_NAMESPACE: &str = ".cc-rewind";
pub const LOG_EXT: &str = "jsonl";

/// Encode a working-directory path as a flat directory name.
pub fn encode_working_dir(cwd: &Path) -> String {
    cwd.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Strict UUID check for session identifiers taken from file names.
pub fn is_valid_session_id(id: &str) -> bool {
    Uuid::try_parse(id).is_ok()
}

// =============================================================================
// Store Layout
// =============================================================================

#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the config root: env override, else `~/.cc-rewind`.
    pub fn from_env() -> Result<Self, RewindError> {
        if let Some(root) = env::var_os(CONFIG_ROOT_ENV) {
            return Ok(Self::new(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(RewindError::HomeDirUnavailable)?;
        Ok(Self::new(home.join(DEFAULT_ROOT_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-project directory holding that project's session logs.
    pub fn project_dir(&self, cwd: &Path) -> PathBuf {
        self.root.join("projects").join(encode_working_dir(cwd))
    }

    pub fn session_log(&self, cwd: &Path, session_id: &str) -> PathBuf {
        self.project_dir(cwd)
            .join(format!("{session_id}.{LOG_EXT}"))
    }

    pub fn snapshot_log(&self, cwd: &Path, session_id: &str) -> PathBuf {
        self.project_dir(cwd)
            .join(SNAPSHOT_NAMESPACE)
            .join("snapshots")
            .join(format!("{session_id}.{LOG_EXT}"))
    }
}

// =============================================================================
// Tests
// =============================================================================
