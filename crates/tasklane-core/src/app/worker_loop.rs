//! WorkerLoop - タスク実行ループ
//!
//! # フロー
//! 1. `PriorityQueueSet::pop()` で自分の lane から task_id を取得
//! 2. `TaskStore::transition()` で PENDING/RETRYING → RUNNING（claim）
//! 3. RunningTasks に登録し、ハンドラを別タスクで起動
//! 4. 完了・timeout・キャンセルのどれかが先に来るまで待つ
//! 5. RunningTasks から取り出せたら settle（取り出せなければ monitor が確定済み）

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info};

use super::engine::{Engine, Settlement};
use crate::domain::{FailureKind, Priority, TaskId, TaskStatus, TaskUpdate};
use crate::typed::{ProgressSink, TaskContext};

pub(crate) async fn run_worker(
    engine: Arc<Engine>,
    priority: Priority,
    worker_no: usize,
    shutdown: CancellationToken,
) {
    debug!(%priority, worker_no, "worker started");
    loop {
        let popped = tokio::select! {
            _ = shutdown.cancelled() => break,
            popped = engine.queues.pop(priority, engine.config.pop_wait) => popped,
        };
        let Some(task_id) = popped else {
            continue;
        };
        engine.execute(task_id).await;
    }
    debug!(%priority, worker_no, "worker stopped");
}

fn panic_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "handler task aborted".to_string();
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Engine {
    /// Run one attempt of `task_id` end to end. Never panics, never errors:
    /// every failure ends up in the record.
    pub(crate) async fn execute(self: &Arc<Self>, task_id: TaskId) {
        let now = self.clock.now();

        // 重複して queue に載っていた id が backoff 前に走らないようにする
        match self.store.find_by_id(task_id).await {
            Ok(Some(record)) if record.is_due(now) => {}
            Ok(_) => {
                debug!(%task_id, "popped task is not dispatchable, skipping");
                return;
            }
            Err(e) => {
                error!(%task_id, error = %e, "failed to load popped task");
                return;
            }
        }

        let record = match self
            .store
            .transition(task_id, &TaskStatus::DISPATCHABLE, TaskUpdate::running(now))
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(%task_id, "claim lost, skipping");
                return;
            }
            Err(e) => {
                error!(%task_id, error = %e, "claim failed");
                return;
            }
        };

        let cancel = CancellationToken::new();
        let timeout = Duration::from_secs(record.timeout_seconds);
        self.running.insert(record.clone(), cancel.clone()).await;
        info!(
            %task_id,
            task_type = %record.task_type,
            priority = %record.priority,
            attempt = record.attempt(),
            "task started"
        );

        let handler = self.registry.resolve(record.task_type.as_str());
        let ctx = TaskContext::new(
            task_id,
            record.task_type.clone(),
            record.attempt(),
            cancel.clone(),
            Arc::clone(self) as Arc<dyn ProgressSink>,
        );
        let parameters = record.parameters.clone();
        let mut attempt =
            AbortOnDropHandle::new(tokio::spawn(async move { handler.handle(parameters, ctx).await }));

        let outcome = tokio::select! {
            joined = &mut attempt => match joined {
                Ok(Ok(result)) => Settlement::Completed(result),
                Ok(Err(e)) => Settlement::Failed(e.into()),
                Err(e) => Settlement::Failed(FailureKind::Panicked(panic_message(e))),
            },
            _ = tokio::time::sleep(timeout) => Settlement::Failed(FailureKind::Timeout),
            _ = cancel.cancelled() => Settlement::Cancelled,
        };
        drop(attempt);

        let Some(entry) = self.running.take(task_id).await else {
            debug!(%task_id, "attempt already settled elsewhere");
            return;
        };
        let outcome = if entry.cancel_requested {
            Settlement::Cancelled
        } else {
            outcome
        };
        self.settle(&entry.record, entry.started.elapsed(), outcome)
            .await;
    }
}
