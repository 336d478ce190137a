//! Engine - ループ間で共有する実行コア
//!
//! worker / scheduler / monitor はすべて `Arc<Engine>` を持ち、
//! attempt の確定（settle）はここに一本化されている。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::running::RunningTasks;
use super::stats::StatsCollector;
use crate::config::ProcessorConfig;
use crate::domain::{
    CANCELLED_MESSAGE, ExecutionLogEntry, FailureKind, TaskId, TaskRecord, TaskStatus, TaskUpdate,
};
use crate::ports::{Clock, IdGenerator, TaskStore};
use crate::queue::{PriorityQueueSet, RetryDecision, RetryPolicy};
use crate::typed::{HandlerRegistry, ProgressSink};

/// How an attempt ended, before the retry policy is applied.
#[derive(Debug)]
pub(crate) enum Settlement {
    Completed(serde_json::Value),
    Failed(FailureKind),
    Cancelled,
}

pub(crate) struct Engine {
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) registry: HandlerRegistry,
    pub(crate) queues: PriorityQueueSet,
    pub(crate) running: RunningTasks,
    pub(crate) stats: StatsCollector,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) config: ProcessorConfig,
    pub(crate) retry: RetryPolicy,
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}

impl Engine {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        registry: HandlerRegistry,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            registry,
            queues: PriorityQueueSet::new(config.queue_capacities),
            running: RunningTasks::new(),
            stats: StatsCollector::new(),
            clock,
            ids,
            retry: config.retry_policy(),
            config,
        }
    }

    /// Persist the end of one attempt, record it in history and stats.
    ///
    /// Only writes if the record is still RUNNING, so a late settle never
    /// overwrites a state someone else already moved on from.
    pub(crate) async fn settle(
        &self,
        record: &TaskRecord,
        elapsed: Duration,
        outcome: Settlement,
    ) -> TaskStatus {
        let now = self.clock.now();
        let (update, status, error) = match outcome {
            Settlement::Completed(result) => {
                (TaskUpdate::completed(result, now), TaskStatus::Completed, None)
            }
            Settlement::Cancelled => (
                TaskUpdate::cancelled(now),
                TaskStatus::Cancelled,
                Some(CANCELLED_MESSAGE.to_string()),
            ),
            Settlement::Failed(kind) => {
                let message = kind.message();
                match self.retry.decide(record.retry_count, record.max_retries) {
                    RetryDecision::Retry { retry_count, delay } => (
                        TaskUpdate::retrying(retry_count, after(now, delay), message.clone()),
                        TaskStatus::Retrying,
                        Some(message),
                    ),
                    RetryDecision::GiveUp => (
                        TaskUpdate::failed(message.clone(), now),
                        TaskStatus::Failed,
                        Some(message),
                    ),
                }
            }
        };

        match self
            .store
            .transition(record.id, &[TaskStatus::Running], update)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => warn!(task_id = %record.id, %status, "record left RUNNING before settle; outcome dropped"),
            Err(e) => error!(task_id = %record.id, %status, error = %e, "failed to persist attempt outcome"),
        }

        match status {
            TaskStatus::Completed => {
                info!(task_id = %record.id, task_type = %record.task_type, elapsed_ms = elapsed.as_millis() as u64, "task completed")
            }
            TaskStatus::Retrying => {
                warn!(task_id = %record.id, task_type = %record.task_type, attempt = record.attempt(), error = error.as_deref().unwrap_or(""), "attempt failed, retry scheduled")
            }
            _ => {
                warn!(task_id = %record.id, task_type = %record.task_type, %status, error = error.as_deref().unwrap_or(""), "task finished without success")
            }
        }

        self.stats
            .record_outcome(&record.task_type, status, Some(elapsed))
            .await;
        self.append_history(record, status, error, elapsed).await;
        status
    }

    async fn append_history(
        &self,
        record: &TaskRecord,
        outcome: TaskStatus,
        error: Option<String>,
        elapsed: Duration,
    ) {
        let entry = ExecutionLogEntry::for_attempt(
            self.ids.generate_log_id(),
            record,
            outcome,
            error,
            elapsed.as_millis().try_into().unwrap_or(u64::MAX),
            self.clock.now(),
        );
        if let Err(e) = self.store.append_log(&entry).await {
            error!(task_id = %record.id, error = %e, "failed to append execution log");
        }
    }
}

#[async_trait]
impl ProgressSink for Engine {
    async fn report(&self, task_id: TaskId, percent: f64, message: Option<String>) {
        // settle 済みの attempt からの報告は捨てる
        if !self
            .running
            .update_progress(task_id, percent, message.clone())
            .await
        {
            return;
        }
        if let Err(e) = self
            .store
            .transition(
                task_id,
                &[TaskStatus::Running],
                TaskUpdate::progress(percent, message),
            )
            .await
        {
            warn!(%task_id, error = %e, "failed to persist progress");
        }
    }
}
