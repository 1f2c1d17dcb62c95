//! Error taxonomy for the session store.
//!
//! Parse-level problems (malformed lines, missing files) are absorbed where
//! they occur and never surface here. These variants cover the failures that
//! callers must be able to act on: bad input, log corruption, and writes
//! that may have left the log inconsistent.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewindError {
    #[error("could not resolve home directory for the config root")]
    HomeDirUnavailable,

    #[error("not a valid session id: {0:?}")]
    InvalidSessionId(String),

    /// Checkpoint requested with an out-of-range visible message index.
    #[error("message index {requested} out of range (session has {visible_len} visible messages)")]
    InvalidIndex { requested: usize, visible_len: usize },

    /// The resolved target record has no position in the raw log. The file
    /// changed under us or is corrupt.
    #[error("target record {uuid} not found in session log")]
    UnresolvedTarget { uuid: String },

    /// The project's session directory exists but could not be read.
    #[error("could not scan session directory {path}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The truncated log could not be written. Fatal to a rewind: the on-disk
    /// state may no longer match what the caller was told.
    #[error("could not persist session log {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
