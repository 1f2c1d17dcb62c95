//! Transcript reconstruction over a flat append log.
//!
//! A session file's records need not form a single chain, but the last
//! appended record is always the head of the active transcript. The chain is
//! rebuilt per read by walking `parentUuid` pointers backward through a
//! transient uuid index; no long-lived graph structure is kept.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::record::{LogRecord, RecordKind};

pub const SUMMARY_MAX_CHARS: usize = 45;
const NO_PROMPT: &str = "No prompt";

// =============================================================================
// Chain Reconstruction
// =============================================================================

/// Rebuild the active transcript, ordered root-to-leaf.
///
/// The last record in file order is the leaf. The walk stops at a record
/// with no parent or a parent uuid that resolves to nothing.
pub fn build_chain(records: &[LogRecord]) -> Vec<&LogRecord> {
    let Some(leaf) = records.last() else {
        return Vec::new();
    };

    let index: HashMap<&str, &LogRecord> =
        records.iter().map(|r| (r.uuid.as_str(), r)).collect();

    let mut chain = vec![leaf];
    let mut current = leaf;
    // Cap the walk: duplicate uuids in a corrupt log could form a cycle.
    while chain.len() <= records.len() {
        let Some(parent) = current
            .parent_uuid
            .as_deref()
            .and_then(|p| index.get(p).copied())
        else {
            break;
        };
        chain.push(parent);
        current = parent;
    }

    chain.reverse();
    chain
}

// =============================================================================
// Visible Projection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A transcript turn as shown to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleMessage {
    pub role: Role,
    pub uuid: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_result: Option<Value>,
}

/// Project one record onto the visible transcript.
///
/// Meta records and the system/attachment/summary kinds are dropped; summary
/// records are consumed only for metadata, never shown as a turn.
pub fn visible_message(record: &LogRecord) -> Option<VisibleMessage> {
    if record.is_meta {
        return None;
    }
    match record.kind {
        RecordKind::User => Some(VisibleMessage {
            role: Role::User,
            uuid: record.uuid.clone(),
            payload: record.message.clone(),
            tool_use_result: record.tool_use_result.clone(),
        }),
        RecordKind::Assistant => Some(VisibleMessage {
            role: Role::Assistant,
            uuid: record.uuid.clone(),
            payload: record.message.clone(),
            tool_use_result: None,
        }),
        RecordKind::Attachment | RecordKind::System | RecordKind::Summary => None,
    }
}

pub fn visible_messages<'a>(chain: impl IntoIterator<Item = &'a LogRecord>) -> Vec<VisibleMessage> {
    chain.into_iter().filter_map(visible_message).collect()
}

// =============================================================================
// Summary Derivation
// =============================================================================

/// One-line session summary for catalog listings.
///
/// Derived from the first non-meta user record, unless a summary record
/// targets the current leaf, in which case that text wins.
pub fn summarize(records: &[LogRecord]) -> String {
    if let Some(leaf) = records.last() {
        let override_text = records.iter().find_map(|r| {
            if r.kind == RecordKind::Summary && r.leaf_uuid.as_deref() == Some(leaf.uuid.as_str()) {
                r.summary.as_deref()
            } else {
                None
            }
        });
        if let Some(text) = override_text {
            return clip(text);
        }
    }

    records
        .iter()
        .find(|r| r.kind == RecordKind::User && !r.is_meta)
        .and_then(|r| user_text(&r.message))
        .map(|t| clip(&t))
        .unwrap_or_else(|| NO_PROMPT.to_string())
}

/// Extract display text from a user payload: either a raw string, or the
/// last text-typed block of a structured content array.
fn user_text(message: &Value) -> Option<String> {
    let content = match message {
        Value::String(s) => return Some(s.clone()),
        Value::Object(_) => message.get("content")?,
        _ => return None,
    };

    if let Some(s) = content.as_str() {
        return Some(s.to_string());
    }

    content.as_array()?.iter().rev().find_map(|block| {
        if block.get("type")?.as_str()? == "text" {
            Some(block.get("text")?.as_str()?.to_string())
        } else {
            None
        }
    })
}

/// Collapse newlines to spaces and truncate to the summary width.
fn clip(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= SUMMARY_MAX_CHARS {
        flat
    } else {
        let truncated: String = flat.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{truncated}...")
    }
}

// =============================================================================
// Tests
// =============================================================================
