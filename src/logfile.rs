//! Newline-delimited JSON log files.
//!
//! All persisted state in this crate (session logs, snapshot logs) is one
//! JSON object per line. Reads are lenient: a malformed line is skipped, a
//! missing file is an empty log. Appends never touch existing content.
//! Rewrites go through a temp file in the same directory and a rename, so a
//! concurrent reader sees either the old or the new content in full.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::warn;

/// Read every syntactically valid record. Missing file yields an empty Vec.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping malformed log line"
                );
            }
        }
    }

    Ok(records)
}

/// Append one newline-terminated record, creating parent directories.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, record)?;
    writeln!(writer)?;
    writer.flush()
}

/// Replace the file's entire content atomically.
///
/// Writes the new content to a temp file beside the target and renames it
/// into place, so no partial-write state is ever visible.
pub fn rewrite_records<T: Serialize>(path: &Path, records: &[T]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writeln!(writer)?;
        }
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogRecord;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let records: Vec<LogRecord> = read_records(&dir.path().join("nope.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn append_then_read_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut parent = None;
        let mut written = Vec::new();
        for i in 0..5 {
            let record = LogRecord::user("sess-1", parent.clone(), json!(format!("msg {i}")));
            parent = Some(record.uuid.clone());
            append_record(&path, &record).unwrap();
            written.push(record);
        }

        let read: Vec<LogRecord> = read_records(&path).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn append_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/log.jsonl");
        let record = LogRecord::user("sess-1", None, json!("deep"));
        append_record(&path, &record).unwrap();
        let read: Vec<LogRecord> = read_records(&path).unwrap();
        assert_eq!(read.len(), 1);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");

        let good = LogRecord::user("sess-1", None, json!("ok"));
        append_record(&path, &good).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{ this is not json\n\n")
            .unwrap();
        let also_good = LogRecord::user("sess-1", Some(good.uuid.clone()), json!("still ok"));
        append_record(&path, &also_good).unwrap();

        let read: Vec<LogRecord> = read_records(&path).unwrap();
        assert_eq!(read, vec![good, also_good]);
    }

    #[test]
    fn rewrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");

        for i in 0..4 {
            append_record(&path, &LogRecord::user("sess-1", None, json!(i))).unwrap();
        }
        let all: Vec<LogRecord> = read_records(&path).unwrap();
        rewrite_records(&path, &all[..2]).unwrap();

        let read: Vec<LogRecord> = read_records(&path).unwrap();
        assert_eq!(read, all[..2]);
    }

    #[test]
    fn rewrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        rewrite_records(&path, &[LogRecord::user("sess-1", None, json!("x"))]).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("log.jsonl")]);
    }
}
