//! JsonFileTaskStore - JSON ファイルに永続化する TaskStore
//!
//! 変更のたびにドキュメント全体を一時ファイルへ書き出し、rename で置き換える。
//! 書き込みに失敗した変更はメモリ上にも反映されない。
//! 再起動後は `open()` でスナップショットを読み直し、RUNNING のまま残った
//! レコードは monitor の orphan 回収が拾う。

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::collection::DocumentCollections;
use crate::domain::{
    ExecutionLogEntry, StorageError, TaskId, TaskRecord, TaskStatus, TaskUpdate,
};
use crate::ports::TaskStore;

pub struct JsonFileTaskStore {
    path: PathBuf,
    inner: Mutex<DocumentCollections>,
}

impl JsonFileTaskStore {
    /// Open (or create on first write) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let collections = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => DocumentCollections::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => DocumentCollections::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "task store opened");

        Ok(Self {
            path,
            inner: Mutex::new(collections),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn persist(&self, collections: &DocumentCollections) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(collections)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    /// Apply `f` to a copy, persist it, then swap it in.
    async fn commit<T>(
        &self,
        f: impl FnOnce(&mut DocumentCollections) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.inner.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn insert(&self, record: &TaskRecord) -> Result<(), StorageError> {
        self.commit(|c| c.insert(record)).await
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
        self.commit(|c| c.update(id, &update)).await
    }

    async fn transition(
        &self,
        id: TaskId,
        from: &[TaskStatus],
        update: TaskUpdate,
    ) -> Result<Option<TaskRecord>, StorageError> {
        self.commit(|c| c.transition(id, from, &update)).await
    }

    async fn delete_older_than(
        &self,
        statuses: &[TaskStatus],
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        self.commit(|c| c.delete_older_than(statuses, cutoff)).await
    }

    async fn count_by_status(&self) -> Result<HashMap<TaskStatus, usize>, StorageError> {
        self.inner.lock().await.count_by_status()
    }

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), StorageError> {
        self.commit(|c| {
            c.append_log(entry);
            Ok(())
        })
        .await
    }

    async fn recent_logs(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StorageError> {
        self.inner.lock().await.recent_logs(owner, limit)
    }

    async fn delete_logs_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        self.commit(|c| c.delete_logs_older_than(cutoff)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogId, NewTask, Priority};
    use ulid::Ulid;

    fn record() -> TaskRecord {
        TaskRecord::new(
            TaskId::from_ulid(Ulid::new()),
            NewTask::new("report_generation", serde_json::json!({"report_type": "weekly"}))
                .priority(Priority::High),
            3,
            300,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTaskStore::open(dir.path().join("tasks.json"))
            .await
            .unwrap();

        assert!(store.count_by_status().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn records_and_logs_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.json");
        let rec = record();

        {
            let store = JsonFileTaskStore::open(&path).await.unwrap();
            store.insert(&rec).await.unwrap();
            store
                .transition(rec.id, &TaskStatus::DISPATCHABLE, TaskUpdate::running(Utc::now()))
                .await
                .unwrap();
            let entry = ExecutionLogEntry::for_attempt(
                LogId::from_ulid(Ulid::new()),
                &rec,
                TaskStatus::Retrying,
                Some("flaky".into()),
                12,
                Utc::now(),
            );
            store.append_log(&entry).await.unwrap();
        }

        let reopened = JsonFileTaskStore::open(&path).await.unwrap();
        let back = reopened.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(back.status, TaskStatus::Running);
        assert_eq!(back.priority, Priority::High);

        let logs = reopened.recent_logs(None, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].error_message.as_deref(), Some("flaky"));
        assert!(!dir.path().join("nested").join("tasks.json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_mutation_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTaskStore::open(dir.path().join("tasks.json"))
            .await
            .unwrap();
        let rec = record();
        store.insert(&rec).await.unwrap();

        assert!(matches!(
            store.insert(&rec).await,
            Err(StorageError::Duplicate(_))
        ));
        assert_eq!(store.find_by_status(&TaskStatus::ALL).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_document_is_skipped_by_bulk_queries_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let good = record();
        {
            let store = JsonFileTaskStore::open(&path).await.unwrap();
            store.insert(&good).await.unwrap();
        }

        let bad_id = TaskId::from_ulid(Ulid::new());
        let mut raw: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        let mut bad = raw["tasks"][good.id.to_string()].clone();
        bad["id"] = serde_json::json!(bad_id.to_string());
        bad["status"] = serde_json::json!("queued");
        raw["tasks"][bad_id.to_string()] = bad;
        tokio::fs::write(&path, serde_json::to_vec(&raw).unwrap())
            .await
            .unwrap();

        let store = JsonFileTaskStore::open(&path).await.unwrap();
        let ready = store
            .find_ready(&TaskStatus::DISPATCHABLE, Utc::now())
            .await
            .unwrap();
        assert_eq!(ready.iter().map(|r| r.id).collect::<Vec<_>>(), vec![good.id]);
        assert_eq!(
            store.count_by_status().await.unwrap().get(&TaskStatus::Pending),
            Some(&1)
        );
        assert!(matches!(
            store.find_by_id(bad_id).await,
            Err(StorageError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn garbage_file_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert!(matches!(
            JsonFileTaskStore::open(&path).await,
            Err(StorageError::Encoding(_))
        ));
    }
}
