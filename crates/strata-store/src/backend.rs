//! Store backends: the seam between the coordinator and physical storage.
//!
//! Two kinds ship with strata — ephemeral in-memory and durable
//! file-backed JSONL. The trait is also the injection point for test
//! doubles (e.g. a backend that fails its next persist).

use std::path::PathBuf;

use crate::error::{CommitError, StoreOpenError};
use crate::jsonl;
use crate::record::RecordMap;

/// Physical storage for committed records.
///
/// `load` runs once at open; `persist` receives the full committed state
/// after each commit and must either apply it durably or fail without
/// partial effects.
pub trait StoreBackend: Send {
    /// Human-readable description, used in log events.
    fn describe(&self) -> String;

    fn load(&mut self) -> Result<RecordMap, StoreOpenError>;

    fn persist(&mut self, records: &RecordMap) -> Result<(), CommitError>;

    /// Release any held resources. Default: nothing to release.
    fn close(&mut self) {}
}

/// Ephemeral backend: nothing survives the coordinator.
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl MemoryBackend {
    pub fn new() -> Self {
        Self
    }
}

impl StoreBackend for MemoryBackend {
    fn describe(&self) -> String {
        "in-memory".to_string()
    }

    fn load(&mut self) -> Result<RecordMap, StoreOpenError> {
        Ok(RecordMap::new())
    }

    fn persist(&mut self, _records: &RecordMap) -> Result<(), CommitError> {
        Ok(())
    }
}

/// Durable backend: a JSONL file replaced atomically on every persist.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl StoreBackend for FileBackend {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn load(&mut self) -> Result<RecordMap, StoreOpenError> {
        let records = jsonl::read_records_from_path(&self.path)?;
        Ok(records.into_iter().map(|r| (r.id, r)).collect())
    }

    fn persist(&mut self, records: &RecordMap) -> Result<(), CommitError> {
        let ordered: Vec<_> = records.values().cloned().collect();
        jsonl::write_records_to_path(&self.path, &ordered)
    }
}
