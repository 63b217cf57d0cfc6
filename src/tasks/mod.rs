//! Task tracking collaborator.
//!
//! The orchestrator reports run progress through this interface; the
//! excluded API layer reads the records. A run is either fully completed or
//! failed; there is no partial-success status.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::models::{TaskRecord, TaskStatus};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted task record store.
#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Create a queued task record.
    async fn create(&self, id: &str) -> Result<TaskRecord, TaskError>;

    /// Transition queued -> processing.
    async fn mark_processing(&self, id: &str) -> Result<(), TaskError>;

    /// Transition to completed with the JSON result payload.
    async fn complete(&self, id: &str, result: &str) -> Result<(), TaskError>;

    /// Transition to failed with a human-readable message.
    async fn fail(&self, id: &str, message: &str) -> Result<(), TaskError>;

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, TaskError>;
}

/// Task store keeping one JSON file per task.
pub struct JsonTaskStore {
    dir: PathBuf,
}

impl JsonTaskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn task_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("task_{id}.json"))
    }

    fn read(&self, id: &str) -> Result<Option<TaskRecord>, TaskError> {
        let path = self.task_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write(&self, record: &TaskRecord) -> Result<(), TaskError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.task_path(&record.id);
        std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
        debug!("task {} -> {}", record.id, record.status.as_str());
        Ok(())
    }

    fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut TaskRecord),
    ) -> Result<(), TaskError> {
        let mut record = self
            .read(id)?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        apply(&mut record);
        record.updated_at = Utc::now();
        self.write(&record)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TaskTracker for JsonTaskStore {
    async fn create(&self, id: &str) -> Result<TaskRecord, TaskError> {
        let record = TaskRecord::new(id);
        self.write(&record)?;
        Ok(record)
    }

    async fn mark_processing(&self, id: &str) -> Result<(), TaskError> {
        self.update(id, |record| record.status = TaskStatus::Processing)
    }

    async fn complete(&self, id: &str, result: &str) -> Result<(), TaskError> {
        self.update(id, |record| {
            record.status = TaskStatus::Completed;
            record.result = Some(result.to_string());
        })
    }

    async fn fail(&self, id: &str, message: &str) -> Result<(), TaskError> {
        self.update(id, |record| {
            record.status = TaskStatus::Failed;
            record.error = Some(message.to_string());
        })
    }

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, TaskError> {
        self.read(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn task_lifecycle_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTaskStore::new(dir.path());

        let record = store.create("run-1").await.unwrap();
        assert_eq!(record.status, TaskStatus::Queued);

        store.mark_processing("run-1").await.unwrap();
        assert_eq!(
            store.get("run-1").await.unwrap().unwrap().status,
            TaskStatus::Processing
        );

        store.complete("run-1", "{\"pdf_count\":2}").await.unwrap();
        let done = store.get("run-1").await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("{\"pdf_count\":2}"));
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn failed_task_records_the_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTaskStore::new(dir.path());

        store.create("run-2").await.unwrap();
        store.fail("run-2", "portal authentication failed").await.unwrap();

        let failed = store.get("run-2").await.unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("portal authentication failed"));
    }

    #[tokio::test]
    async fn updating_missing_task_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTaskStore::new(dir.path());
        let err = store.mark_processing("ghost").await.unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }
}
