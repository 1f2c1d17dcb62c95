use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use cc_rewind::{logfile, paths, LogRecord, Role, SessionInfo, SessionStore, VisibleMessage};

// =============================================================================
// CLI Interface
// =============================================================================

#[derive(Parser)]
#[command(name = "cc-rewind", about = "Browse and rewind session logs")]
struct Args {
    /// Project working directory (defaults to the current directory)
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the project's sessions as a table
    List {
        /// Number of sessions to show
        #[arg(long, default_value = "15")]
        count: usize,
    },
    /// Print a session's transcript
    Show {
        /// Session id, or a path to a .jsonl log file
        session: String,
    },
    /// Rewind a session to just before a message, reverting file edits
    Restore {
        /// Session id, or a path to a .jsonl log file
        session: String,
        /// Zero-based index into the visible transcript
        index: usize,
    },
    /// Append a user message to a session log (debugging aid)
    Append {
        /// Session id
        session: String,
        /// Message text
        text: String,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cwd = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Could not determine working directory")?,
    };
    let store = SessionStore::new().context("Could not locate session store")?;

    match args.command {
        Command::List { count } => {
            let sessions = store
                .list_sessions(&cwd)
                .with_context(|| format!("Could not list sessions for {}", cwd.display()))?;
            if sessions.is_empty() {
                anyhow::bail!("No sessions found for {}", cwd.display());
            }
            print_sessions(&sessions, count);
        }
        Command::Show { session } => {
            print_transcript(&store.get_session(&session, &cwd));
        }
        Command::Restore { session, index } => {
            let kept = store
                .restore_checkpoint(&session, &cwd, index)
                .with_context(|| format!("Could not rewind session {session}"))?;
            println!("Rewound to {} visible message(s)", kept.len());
            print_transcript(&kept);
        }
        Command::Append { session, text } => {
            if !paths::is_valid_session_id(&session) {
                anyhow::bail!("Not a valid session id: {session}");
            }
            let log_path = store.paths().session_log(&cwd, &session);
            let records: Vec<LogRecord> = logfile::read_records(&log_path)
                .with_context(|| format!("Could not read session log {}", log_path.display()))?;
            let parent = records.last().map(|r| r.uuid.clone());
            let record = LogRecord::user(
                &session,
                parent,
                serde_json::json!({"role": "user", "content": text}),
            );
            store
                .append_record(&cwd, &record)
                .with_context(|| format!("Could not append to session {session}"))?;
            println!("Appended {}", record.uuid);
        }
    }

    Ok(())
}

// =============================================================================
// Display Functions
// =============================================================================

fn print_sessions(sessions: &[SessionInfo], count: usize) {
    println!("{:<6} {:<6} {:<40} SUMMARY", "MOD", "MSGS", "ID");
    println!("{}", "─".repeat(100));

    for session in sessions.iter().take(count) {
        let modified = format_time_relative(session.last_modified);
        println!(
            "{:<6} {:<6} {:<40} {}",
            modified, session.message_count, session.id, session.summary
        );
    }

    println!("{}", "─".repeat(100));
    println!("Total: {} sessions", sessions.len());
}

fn print_transcript(messages: &[VisibleMessage]) {
    if messages.is_empty() {
        println!("(empty transcript)");
        return;
    }
    for (i, msg) in messages.iter().enumerate() {
        let prefix = match msg.role {
            Role::User => "U",
            Role::Assistant => "A",
        };
        let text = message_text(&msg.payload).unwrap_or_else(|| "(no text)".to_string());
        println!("[{i}] {prefix}: {}", truncate_str(&text, 200));
    }
}

fn format_time_relative(time: SystemTime) -> String {
    let now = SystemTime::now();
    let duration = now.duration_since(time).unwrap_or_default();
    let secs = duration.as_secs();

    if secs < 60 {
        "now".to_string()
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else if secs < 604800 {
        format!("{}d", secs / 86400)
    } else {
        format!("{}w", secs / 604800)
    }
}

/// Extract display text from a message payload: a raw string, or the first
/// text-typed block of a structured content array.
fn message_text(payload: &Value) -> Option<String> {
    let content = payload.get("content")?;
    if let Some(s) = content.as_str() {
        return Some(s.to_string());
    }
    content.as_array()?.iter().find_map(|block| {
        if block.get("type")?.as_str()? == "text" {
            Some(block.get("text")?.as_str()?.to_string())
        } else {
            None
        }
    })
}

/// Truncate string to max chars, adding ... if truncated
fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn format_time_relative_now() {
        assert_eq!(format_time_relative(SystemTime::now()), "now");
    }

    #[test]
    fn format_time_relative_minutes() {
        let time = SystemTime::now() - Duration::from_secs(120);
        assert_eq!(format_time_relative(time), "2m");
    }

    #[test]
    fn format_time_relative_hours() {
        let time = SystemTime::now() - Duration::from_secs(3 * 3600);
        assert_eq!(format_time_relative(time), "3h");
    }

    #[test]
    fn format_time_relative_days() {
        let time = SystemTime::now() - Duration::from_secs(2 * 86400);
        assert_eq!(format_time_relative(time), "2d");
    }

    #[test]
    fn message_text_handles_both_content_shapes() {
        let plain = json!({"role": "user", "content": "hello"});
        assert_eq!(message_text(&plain).as_deref(), Some("hello"));

        let blocks = json!({"role": "assistant", "content": [
            {"type": "tool_use", "name": "Write"},
            {"type": "text", "text": "done"}
        ]});
        assert_eq!(message_text(&blocks).as_deref(), Some("done"));

        assert!(message_text(&json!(null)).is_none());
    }

    #[test]
    fn truncate_str_respects_char_boundaries() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("ééééé", 3), "ééé...");
    }
}
