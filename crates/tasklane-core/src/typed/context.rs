//! TaskContext - ハンドラに渡す実行コンテキスト
//!
//! ハンドラはワーカーの内部に触れない。見えるのは task の識別情報、
//! 進捗報告の窓口、キャンセル信号だけ。

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{TaskId, TaskType};

/// Destination of progress reports.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// `percent` is already clamped to `0.0..=100.0`.
    async fn report(&self, task_id: TaskId, percent: f64, message: Option<String>);
}

struct DiscardProgress;

#[async_trait]
impl ProgressSink for DiscardProgress {
    async fn report(&self, _task_id: TaskId, _percent: f64, _message: Option<String>) {}
}

#[derive(Clone)]
pub struct TaskContext {
    task_id: TaskId,
    task_type: TaskType,
    attempt: u32,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressSink>,
}

impl TaskContext {
    pub fn new(
        task_id: TaskId,
        task_type: TaskType,
        attempt: u32,
        cancel: CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            task_id,
            task_type,
            attempt,
            cancel,
            progress,
        }
    }

    /// A context whose progress goes nowhere. For calling handlers directly.
    pub fn detached(task_id: TaskId, task_type: TaskType) -> Self {
        Self::new(
            task_id,
            task_type,
            1,
            CancellationToken::new(),
            Arc::new(DiscardProgress),
        )
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    /// 1-based attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub async fn report_progress(&self, percent: f64, message: impl Into<String>) {
        self.progress
            .report(self.task_id, percent.clamp(0.0, 100.0), Some(message.into()))
            .await;
    }

    /// Set once cancellation of this attempt was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
