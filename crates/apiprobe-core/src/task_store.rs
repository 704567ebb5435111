//! Task registry for submitted runs.
//!
//! The registry is the only state shared between concurrent runs. Each run
//! publishes twice: once at submission (`RUNNING`) and once when it finishes
//! (`COMPLETED` or `FAILED`). Updates lock only the affected entry.
//!
//! [`JsonTaskStore`] additionally persists finished tasks as one JSON file per
//! task so they survive a restart.

use crate::pipeline::RunReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    NotFound,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Status and result of one submitted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// A freshly submitted task.
    pub fn running(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Running,
            error: None,
            result: None,
            start_time: Some(Utc::now()),
            end_time: None,
        }
    }

    /// Placeholder returned when polling an unknown id.
    pub fn not_found(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::NotFound,
            error: None,
            result: None,
            start_time: None,
            end_time: None,
        }
    }
}

/// Shared registry of tasks, keyed by task id.
pub trait TaskStore: Send + Sync {
    fn insert(&self, record: TaskRecord);

    fn get(&self, task_id: &str) -> Option<TaskRecord>;

    /// Marks the task `COMPLETED` with `report`. Unknown ids are ignored.
    fn complete(&self, task_id: &str, report: RunReport);

    /// Marks the task `FAILED` with `error`. Unknown ids are ignored.
    fn fail(&self, task_id: &str, error: String);
}

/// In-memory registry. The map lock is held only to find or add an entry;
/// updates lock the entry itself.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Arc<Mutex<TaskRecord>>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, task_id: &str) -> Option<Arc<Mutex<TaskRecord>>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }

    /// Applies `f` to the record under its own lock and returns the updated copy.
    fn update(&self, task_id: &str, f: impl FnOnce(&mut TaskRecord)) -> Option<TaskRecord> {
        let entry = self.entry(task_id)?;
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut record);
        Some(record.clone())
    }

    fn complete_record(&self, task_id: &str, report: RunReport) -> Option<TaskRecord> {
        self.update(task_id, |r| {
            r.status = TaskStatus::Completed;
            r.result = Some(report);
            r.error = None;
            r.end_time = Some(Utc::now());
        })
    }

    fn fail_record(&self, task_id: &str, error: String) -> Option<TaskRecord> {
        self.update(task_id, |r| {
            r.status = TaskStatus::Failed;
            r.error = Some(error);
            r.end_time = Some(Utc::now());
        })
    }
}

impl TaskStore for InMemoryTaskStore {
    fn insert(&self, record: TaskRecord) {
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.task_id.clone(), Arc::new(Mutex::new(record)));
    }

    fn get(&self, task_id: &str) -> Option<TaskRecord> {
        let entry = self.entry(task_id)?;
        let record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(record.clone())
    }

    fn complete(&self, task_id: &str, report: RunReport) {
        if self.complete_record(task_id, report).is_none() {
            warn!(task_id, "Completed unknown task");
        }
    }

    fn fail(&self, task_id: &str, error: String) {
        if self.fail_record(task_id, error).is_none() {
            warn!(task_id, "Failed unknown task");
        }
    }
}

/// Registry that also writes finished tasks to `<dir>/<taskId>.json`.
pub struct JsonTaskStore {
    inner: InMemoryTaskStore,
    dir: PathBuf,
}

impl JsonTaskStore {
    /// Opens the store at `dir`, creating it if needed and restoring every
    /// finished task found there. Unreadable files are skipped.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let inner = InMemoryTaskStore::new();

        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) if record.status.is_finished() => inner.insert(record),
                Ok(record) => debug!(task_id = %record.task_id, "Skipping unfinished task file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable task file"),
            }
        }
        debug!(dir = %dir.display(), tasks = inner.len(), "Loaded task store");
        Ok(Self { inner, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_record(path: &Path) -> Result<TaskRecord, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let path = self.dir.join(format!("{}.json", record.task_id));
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn persist_logged(&self, record: Option<TaskRecord>) {
        if let Some(record) = record
            && let Err(e) = self.persist(&record)
        {
            warn!(task_id = %record.task_id, error = %e, "Failed to persist task");
        }
    }
}

impl TaskStore for JsonTaskStore {
    fn insert(&self, record: TaskRecord) {
        self.inner.insert(record);
    }

    fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.inner.get(task_id)
    }

    fn complete(&self, task_id: &str, report: RunReport) {
        let record = self.inner.complete_record(task_id, report);
        self.persist_logged(record);
    }

    fn fail(&self, task_id: &str, error: String) {
        let record = self.inner.fail_record(task_id, error);
        self.persist_logged(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(base_url: &str) -> RunReport {
        RunReport {
            base_url: base_url.to_string(),
            summary: "done".to_string(),
            ..RunReport::default()
        }
    }

    #[test]
    fn test_insert_and_complete() {
        let store = InMemoryTaskStore::new();
        store.insert(TaskRecord::running("t1"));
        assert_eq!(store.get("t1").unwrap().status, TaskStatus::Running);

        store.complete("t1", report("http://x"));
        let record = store.get("t1").unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.result.unwrap().base_url, "http://x");
        assert!(record.end_time.is_some());
    }

    #[test]
    fn test_fail_records_error() {
        let store = InMemoryTaskStore::new();
        store.insert(TaskRecord::running("t1"));
        store.fail("t1", "document unreachable".to_string());
        let record = store.get("t1").unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("document unreachable"));
        assert!(record.result.is_none());
    }

    #[test]
    fn test_unknown_ids() {
        let store = InMemoryTaskStore::new();
        assert!(store.get("nope").is_none());
        store.complete("nope", report("http://x"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let v = serde_json::to_value(TaskRecord::running("abc")).unwrap();
        assert_eq!(v["taskId"], "abc");
        assert_eq!(v["status"], "RUNNING");
        assert!(v.get("startTime").is_some());
        assert!(v.get("result").is_none());

        let v = serde_json::to_value(TaskRecord::not_found("zzz")).unwrap();
        assert_eq!(v["status"], "NOT_FOUND");
    }

    #[test]
    fn test_concurrent_updates_to_distinct_tasks() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let id = format!("t{i}");
                    store.insert(TaskRecord::running(&id));
                    store.complete(&id, report("http://x"));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 16);
        assert!(
            (0..16).all(|i| store.get(&format!("t{i}")).unwrap().status == TaskStatus::Completed)
        );
    }

    // ========================================================================
    // JsonTaskStore Tests
    // ========================================================================

    #[test]
    fn test_json_store_persists_finished_tasks() {
        let tmp = TempDir::new().unwrap();
        {
            let store = JsonTaskStore::open(tmp.path()).unwrap();
            store.insert(TaskRecord::running("done"));
            store.insert(TaskRecord::running("broken"));
            store.insert(TaskRecord::running("pending"));
            store.complete("done", report("http://x"));
            store.fail("broken", "boom".to_string());
        }
        assert!(tmp.path().join("done.json").exists());
        assert!(!tmp.path().join("pending.json").exists());

        let reopened = JsonTaskStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.get("done").unwrap().status, TaskStatus::Completed);
        assert_eq!(reopened.get("broken").unwrap().error.as_deref(), Some("boom"));
        assert!(reopened.get("pending").is_none());
    }

    #[test]
    fn test_json_store_skips_unreadable_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("garbage.json"), "not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        let store = JsonTaskStore::open(tmp.path()).unwrap();
        assert!(store.get("garbage").is_none());
    }

    #[test]
    fn test_json_store_creates_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("tasks");
        let store = JsonTaskStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }
}
