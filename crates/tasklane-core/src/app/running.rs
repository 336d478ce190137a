//! RunningTasks - 実行中 attempt の所有権テーブル
//!
//! エントリを `take()` で取り出した側（worker か monitor）だけがその attempt を
//! 確定（settle）できる。同じ attempt が二重に確定されることはない。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::{TaskId, TaskRecord};

#[derive(Debug)]
pub struct RunningEntry {
    /// Snapshot taken at claim time.
    pub record: TaskRecord,
    pub started: Instant,
    pub cancel: CancellationToken,
    pub cancel_requested: bool,
    pub progress: f64,
    pub progress_message: Option<String>,
}

/// `started_at + timeout + buffer`, or `None` if that does not fit a timestamp.
pub(crate) fn attempt_deadline(record: &TaskRecord, buffer: Duration) -> Option<DateTime<Utc>> {
    let started_at = record.started_at.unwrap_or(record.created_at);
    Duration::from_secs(record.timeout_seconds)
        .checked_add(buffer)
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .and_then(|d| started_at.checked_add_signed(d))
}

impl RunningEntry {
    fn is_stuck(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        attempt_deadline(&self.record, buffer).is_some_and(|deadline| now > deadline)
    }
}

#[derive(Default)]
pub struct RunningTasks {
    entries: Mutex<HashMap<TaskId, RunningEntry>>,
}

impl RunningTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: TaskRecord, cancel: CancellationToken) {
        let entry = RunningEntry {
            progress: record.progress,
            progress_message: record.progress_message.clone(),
            record,
            started: Instant::now(),
            cancel,
            cancel_requested: false,
        };
        self.entries.lock().await.insert(entry.record.id, entry);
    }

    /// Take settlement ownership of `id`.
    pub async fn take(&self, id: TaskId) -> Option<RunningEntry> {
        self.entries.lock().await.remove(&id)
    }

    /// Remove every entry whose claim is older than its timeout plus `buffer`.
    pub async fn take_stuck(&self, now: DateTime<Utc>, buffer: Duration) -> Vec<RunningEntry> {
        let mut entries = self.entries.lock().await;
        let stuck: Vec<TaskId> = entries
            .values()
            .filter(|e| e.is_stuck(now, buffer))
            .map(|e| e.record.id)
            .collect();
        stuck.iter().filter_map(|id| entries.remove(id)).collect()
    }

    pub async fn drain(&self) -> Vec<RunningEntry> {
        self.entries.lock().await.drain().map(|(_, e)| e).collect()
    }

    /// Flag `id` for cancellation and wake its attempt. False if not running.
    pub async fn request_cancel(&self, id: TaskId) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&id) else {
            return false;
        };
        entry.cancel_requested = true;
        entry.cancel.cancel();
        true
    }

    /// False if `id` is no longer running.
    pub async fn update_progress(&self, id: TaskId, percent: f64, message: Option<String>) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&id) else {
            return false;
        };
        entry.progress = percent;
        if message.is_some() {
            entry.progress_message = message;
        }
        true
    }

    pub async fn contains(&self, id: TaskId) -> bool {
        self.entries.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// (progress, message) of a running task.
    pub async fn progress(&self, id: TaskId) -> Option<(f64, Option<String>)> {
        self.entries
            .lock()
            .await
            .get(&id)
            .map(|e| (e.progress, e.progress_message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTask;
    use ulid::Ulid;

    fn record(timeout_seconds: u64) -> TaskRecord {
        TaskRecord::new(
            TaskId::from_ulid(Ulid::new()),
            NewTask::new("noop", serde_json::json!({})),
            3,
            timeout_seconds,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn only_one_taker_wins() {
        let running = RunningTasks::new();
        let rec = record(30);
        running.insert(rec.clone(), CancellationToken::new()).await;

        assert!(running.take(rec.id).await.is_some());
        assert!(running.take(rec.id).await.is_none());
    }

    #[tokio::test]
    async fn cancel_request_sets_flag_and_token() {
        let running = RunningTasks::new();
        let rec = record(30);
        let token = CancellationToken::new();
        running.insert(rec.clone(), token.clone()).await;

        assert!(running.request_cancel(rec.id).await);
        assert!(token.is_cancelled());
        assert!(running.take(rec.id).await.unwrap().cancel_requested);
        assert!(!running.request_cancel(rec.id).await);
    }

    #[tokio::test]
    async fn stuck_entries_are_taken_out() {
        let running = RunningTasks::new();
        let fresh = record(30);
        running.insert(fresh.clone(), CancellationToken::new()).await;

        let mut old = record(1);
        old.started_at = Some(Utc::now() - chrono::Duration::seconds(10));
        running.insert(old.clone(), CancellationToken::new()).await;

        let stuck = running
            .take_stuck(Utc::now(), Duration::from_secs(5))
            .await;
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].record.id, old.id);
        assert!(running.contains(fresh.id).await);
        assert!(running.take_stuck(Utc::now(), Duration::ZERO).await.is_empty());
    }

    #[tokio::test]
    async fn progress_only_updates_live_entries() {
        let running = RunningTasks::new();
        let rec = record(30);
        running.insert(rec.clone(), CancellationToken::new()).await;

        assert!(running.update_progress(rec.id, 40.0, Some("half".into())).await);
        assert_eq!(
            running.progress(rec.id).await,
            Some((40.0, Some("half".to_string())))
        );

        running.take(rec.id).await;
        assert!(!running.update_progress(rec.id, 90.0, None).await);
    }
}
