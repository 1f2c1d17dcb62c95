//! Session log record schema.
//!
//! One `LogRecord` per line in a session `.jsonl` file. Field names on the
//! wire are camelCase. Records form a parent-pointer tree via `parentUuid`;
//! the payload (`message`) is free-form structured data that this crate
//! stores and projects but never interprets beyond text/tool-use extraction.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// Record Kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    User,
    Assistant,
    Attachment,
    System,
    Summary,
}

// =============================================================================
// Log Record
// =============================================================================

/// A single line of a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub uuid: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    pub timestamp: String,
    /// Kind-specific payload. Stored verbatim; never normalized.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_result: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_meta: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_sidechain: bool,
    /// For `summary` records: the transcript leaf this summary describes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_uuid: Option<String>,
    /// For `summary` records: the summary text itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl LogRecord {
    /// Fresh record of the given kind, linked to an optional parent.
    pub fn new(
        kind: RecordKind,
        session_id: impl Into<String>,
        parent_uuid: Option<String>,
        message: Value,
    ) -> Self {
        Self {
            kind,
            uuid: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            parent_uuid,
            timestamp: now_timestamp(),
            message,
            tool_use_result: None,
            is_meta: false,
            is_sidechain: false,
            leaf_uuid: None,
            summary: None,
            cwd: None,
            git_branch: None,
        }
    }

    pub fn user(session_id: impl Into<String>, parent_uuid: Option<String>, message: Value) -> Self {
        Self::new(RecordKind::User, session_id, parent_uuid, message)
    }

    pub fn assistant(
        session_id: impl Into<String>,
        parent_uuid: Option<String>,
        message: Value,
    ) -> Self {
        Self::new(RecordKind::Assistant, session_id, parent_uuid, message)
    }

    /// Meta placeholder written when a rewind would otherwise empty the log.
    /// Keeps the session discoverable by catalog listings.
    pub fn placeholder(session_id: impl Into<String>, cwd: impl Into<String>) -> Self {
        let mut record = Self::new(RecordKind::System, session_id, None, Value::Null);
        record.is_meta = true;
        record.cwd = Some(cwd.into());
        record
    }
}

/// ISO 8601 with millisecond precision, e.g. `2026-01-15T06:15:58.913Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// Tests
// =============================================================================
