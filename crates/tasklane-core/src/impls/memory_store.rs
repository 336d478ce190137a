//! InMemoryTaskStore - 開発・テスト用の TaskStore
//!
//! プロセスが落ちると中身も消える。永続化が必要なら `JsonFileTaskStore` を使う。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::collection::DocumentCollections;
use crate::domain::{
    ExecutionLogEntry, StorageError, TaskId, TaskRecord, TaskStatus, TaskUpdate,
};
use crate::ports::TaskStore;

#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<DocumentCollections>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, record: &TaskRecord) -> Result<(), StorageError> {
        self.inner.lock().await.insert(record)
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<TaskRecord>, StorageError> {
        self.inner.lock().await.find_by_id(id)
    }

    async fn find_ready(
        &self,
        statuses: &[TaskStatus],
        before: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, StorageError> {
        self.inner.lock().await.find_ready(statuses, before)
    }

    async fn find_by_status(
        &self,
        statuses: &[TaskStatus],
    ) -> Result<Vec<TaskRecord>, StorageError> {
        self.inner.lock().await.find_by_status(statuses)
    }

    async fn update_status(&self, id: TaskId, update: TaskUpdate) -> Result<bool, StorageError> {
        self.inner.lock().await.update(id, &update)
    }

    async fn transition(
        &self,
        id: TaskId,
        from: &[TaskStatus],
        update: TaskUpdate,
    ) -> Result<Option<TaskRecord>, StorageError> {
        self.inner.lock().await.transition(id, from, &update)
    }

    async fn delete_older_than(
        &self,
        statuses: &[TaskStatus],
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        self.inner.lock().await.delete_older_than(statuses, cutoff)
    }

    async fn count_by_status(&self) -> Result<HashMap<TaskStatus, usize>, StorageError> {
        self.inner.lock().await.count_by_status()
    }

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), StorageError> {
        self.inner.lock().await.append_log(entry);
        Ok(())
    }

    async fn recent_logs(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StorageError> {
        self.inner.lock().await.recent_logs(owner, limit)
    }

    async fn delete_logs_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        self.inner.lock().await.delete_logs_older_than(cutoff)
    }
}
