//! TaskStore port - タスクの正本（source of truth）
//!
//! TaskStore は以下を管理します：
//! - TaskRecord の状態（status, timestamps, progress, result, error）
//! - 実行履歴（ExecutionLogEntry）
//!
//! # 設計原則
//! - 1 レコード単位のアトミックな更新のみ要求（複数ドキュメントのトランザクションは不要）
//! - キュー・実行中マップ・統計はキャッシュに過ぎない。再起動後はここから再構築する
//! - enum と文字列の相互変換はアダプタ（`impls::document`）の境界に閉じ込める

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ExecutionLogEntry, StorageError, TaskId, TaskRecord, TaskStatus, TaskUpdate};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new record. Fails with `StorageError::Duplicate` if the id exists.
    async fn insert(&self, record: &TaskRecord) -> Result<(), StorageError>;

    async fn find_by_id(&self, id: TaskId) -> Result<Option<TaskRecord>, StorageError>;

    /// Records whose status is in `statuses` and whose `scheduled_at` is unset
    /// or not after `before`, oldest `created_at` first.
    async fn find_ready(
        &self,
        statuses: &[TaskStatus],
        before: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, StorageError>;

    async fn find_by_status(&self, statuses: &[TaskStatus])
    -> Result<Vec<TaskRecord>, StorageError>;

    /// Merge a partial update. Returns `false` when the id does not exist.
    async fn update_status(&self, id: TaskId, update: TaskUpdate) -> Result<bool, StorageError>;

    /// Merge `update` only if the current status is one of `from`.
    /// Returns the updated record, or `None` if the record is missing or in
    /// another state.
    async fn transition(
        &self,
        id: TaskId,
        from: &[TaskStatus],
        update: TaskUpdate,
    ) -> Result<Option<TaskRecord>, StorageError>;

    /// Delete records in `statuses` finished before `cutoff`.
    async fn delete_older_than(
        &self,
        statuses: &[TaskStatus],
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    async fn count_by_status(&self) -> Result<HashMap<TaskStatus, usize>, StorageError>;

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), StorageError>;

    /// Newest first, optionally filtered by owner.
    async fn recent_logs(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StorageError>;

    async fn delete_logs_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;
}
