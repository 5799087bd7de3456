//! JSONL persistence: one stored record per line.
//!
//! The durable interchange format of the file-backed store. Replacement is
//! atomic: write to a temp path, fsync, rename over the target, sync the
//! parent directory.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CommitError, StoreOpenError};
use crate::record::StoredRecord;

/// Read records from a JSONL reader.
pub fn read_records(reader: impl BufRead) -> Result<Vec<StoredRecord>, StoreOpenError> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StoreOpenError::Io(format!("line {}: {e}", line_no + 1)))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: StoredRecord = serde_json::from_str(trimmed).map_err(|e| {
            StoreOpenError::Corrupt(format!("line {}: {e}", line_no + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read records from a JSONL file path. A missing file is an empty store.
pub fn read_records_from_path(path: impl AsRef<Path>) -> Result<Vec<StoredRecord>, StoreOpenError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes =
        fs::read(path).map_err(|e| StoreOpenError::Io(format!("{}: {e}", path.display())))?;
    validate_store_bytes(path, &bytes)?;
    read_records(BufReader::new(bytes.as_slice()))
}

/// Atomically replace the JSONL file at `path` with `records`.
pub fn write_records_to_path(
    path: impl AsRef<Path>,
    records: &[StoredRecord],
) -> Result<(), CommitError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| CommitError::Io(format!("{parent:?}: {e}")))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), CommitError> {
        let file = File::create(&tmp_path)
            .map_err(|e| CommitError::Io(format!("{}: {e}", tmp_path.display())))?;
        let mut writer = BufWriter::new(file);
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| CommitError::Io(format!("serialize {}: {e}", record.id)))?;
            writeln!(writer, "{line}")
                .map_err(|e| CommitError::Io(format!("{}: {e}", tmp_path.display())))?;
        }
        writer
            .flush()
            .map_err(|e| CommitError::Io(format!("{}: {e}", tmp_path.display())))?;
        let file = writer
            .into_inner()
            .map_err(|e| CommitError::Io(format!("{}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| CommitError::Io(format!("{}: {e}", tmp_path.display())))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CommitError::Io(format!(
            "{} -> {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent)
            .map_err(|e| CommitError::Io(format!("{}: {e}", parent.display())))?;
        dir.sync_all()
            .map_err(|e| CommitError::Io(format!("{}: {e}", parent.display())))?;
    }

    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_store_bytes(path: &Path, bytes: &[u8]) -> Result<(), StoreOpenError> {
    if bytes.contains(&0) {
        return Err(StoreOpenError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(StoreOpenError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EntityId, FieldMap};
    use serde_json::json;

    fn record(title: &str) -> StoredRecord {
        let mut fields = FieldMap::new();
        fields.insert("title".to_string(), json!(title));
        StoredRecord::new(EntityId::generate(), "Task", fields)
    }

    #[test]
    fn missing_file_reads_as_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let records =
            read_records_from_path(dir.path().join("absent.jsonl")).expect("read should succeed");
        assert!(records.is_empty());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("store.jsonl");

        let records = vec![record("a"), record("b")];
        write_records_to_path(&path, &records).expect("write should succeed");

        let back = read_records_from_path(&path).expect("read should succeed");
        assert_eq!(back, records);
    }

    #[test]
    fn write_replaces_previous_content_atomically() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("store.jsonl");

        let first = record("first");
        write_records_to_path(&path, std::slice::from_ref(&first)).expect("first write");
        let second = record("second");
        write_records_to_path(&path, std::slice::from_ref(&second)).expect("second write");

        let content = std::fs::read_to_string(&path).expect("store should exist");
        assert!(!content.contains("first"));
        assert!(content.contains("second"));
    }

    #[test]
    fn nul_bytes_are_rejected_as_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("store.jsonl");
        std::fs::write(&path, b"{\"id\":\"x\"}\n\0garbage").expect("fixture should write");

        let err = read_records_from_path(&path).expect_err("corrupt store must fail");
        assert!(matches!(err, StoreOpenError::Corrupt(_)));
    }

    #[test]
    fn unparseable_line_is_corrupt_not_io() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("store.jsonl");
        std::fs::write(&path, "not a record\n").expect("fixture should write");

        let err = read_records_from_path(&path).expect_err("bad line must fail");
        assert!(matches!(err, StoreOpenError::Corrupt(_)));
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("store.jsonl");

        let rec = record("kept");
        let line = serde_json::to_string(&rec).expect("record should serialize");
        std::fs::write(&path, format!("# header\n\n{line}\n")).expect("fixture should write");

        let back = read_records_from_path(&path).expect("read should succeed");
        assert_eq!(back, vec![rec]);
    }
}
