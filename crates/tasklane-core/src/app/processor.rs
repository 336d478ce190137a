//! Processor - 外部に公開する唯一の入口
//!
//! プロセスのエントリポイントが 1 つ構築して `Arc` で配る。
//! グローバルな singleton は持たない。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::Engine;
use super::monitor_loop::{MonitorReport, run_monitor};
use super::scheduler_loop::run_scheduler;
use super::stats::{LiveCounts, Statistics};
use super::worker_pool::spawn_workers;
use crate::config::ProcessorConfig;
use crate::domain::{
    ExecutionLogEntry, NewTask, ProcessorError, TaskId, TaskRecord, TaskStatus, TaskUpdate,
    ValidationError,
};

struct Lifecycle {
    shutdown: CancellationToken,
    tasks: JoinSet<()>,
}

pub struct Processor {
    engine: Arc<Engine>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl Processor {
    pub(crate) fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.engine.config
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.lock().await.is_some()
    }

    /// Recover persisted work, then spawn workers, scheduler and monitor.
    ///
    /// A second call while running is a no-op.
    pub async fn start(&self) -> Result<(), ProcessorError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            debug!("processor already running");
            return Ok(());
        }

        let recovered = self.engine.schedule_tick().await?;
        if recovered > 0 {
            info!(recovered, "re-queued persisted tasks");
        }

        let shutdown = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let workers = spawn_workers(&self.engine, &shutdown, &mut tasks);
        tasks.spawn(run_scheduler(Arc::clone(&self.engine), shutdown.clone()));
        tasks.spawn(run_monitor(Arc::clone(&self.engine), shutdown.clone()));

        *lifecycle = Some(Lifecycle { shutdown, tasks });
        info!(workers, "processor started");
        Ok(())
    }

    /// Signal every loop to stop and wait up to `timeout` for them.
    ///
    /// Loops still busy after `timeout` are aborted; their attempts stay
    /// RUNNING in the store until the monitor reaps them. Returns false in
    /// that case. Calling `stop` on a stopped processor returns true.
    pub async fn stop(&self, timeout: Duration) -> bool {
        let Some(Lifecycle {
            shutdown,
            mut tasks,
        }) = self.lifecycle.lock().await.take()
        else {
            return true;
        };

        shutdown.cancel();
        let graceful = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !graceful {
            warn!(remaining = tasks.len(), "shutdown timed out, aborting loops");
            tasks.shutdown().await;
        }

        let abandoned = self.engine.running.drain().await;
        for entry in &abandoned {
            entry.cancel.cancel();
        }
        if !abandoned.is_empty() {
            warn!(tasks = abandoned.len(), "attempts abandoned at shutdown");
        }

        info!(graceful, "processor stopped");
        graceful
    }

    /// Validate and persist a task. It is queued right away when it has no
    /// dependencies, is already due, and the processor is running; otherwise
    /// the scheduler picks it up.
    pub async fn submit_task(&self, task: NewTask) -> Result<TaskId, ProcessorError> {
        let engine = &self.engine;
        if task.task_type.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyTaskType.into());
        }
        let timeout_seconds = task
            .timeout_seconds
            .unwrap_or(engine.config.default_timeout_seconds);
        if timeout_seconds == 0 {
            return Err(ValidationError::ZeroTimeout.into());
        }
        engine
            .registry
            .resolve(task.task_type.as_str())
            .validate(&task.parameters)
            .map_err(|reason| ValidationError::InvalidParameters {
                task_type: task.task_type.to_string(),
                reason,
            })?;

        let max_retries = task.max_retries.unwrap_or(engine.config.default_max_retries);
        let now = engine.clock.now();
        let record = TaskRecord::new(
            engine.ids.generate_task_id(),
            task,
            max_retries,
            timeout_seconds,
            now,
        );
        engine.store.insert(&record).await?;
        engine.stats.record_submitted(&record.task_type).await;
        info!(
            task_id = %record.id,
            task_type = %record.task_type,
            priority = %record.priority,
            "task submitted"
        );

        if record.depends_on.is_empty()
            && record.is_due(now)
            && self.is_running().await
            && let Err(e) = engine.queues.try_push(record.priority, record.id).await
        {
            debug!(task_id = %record.id, reason = %e, "left for the scheduler");
        }
        Ok(record.id)
    }

    /// PENDING / RETRYING → CANCELLED. False for RUNNING or terminal tasks.
    pub async fn cancel_task(&self, id: TaskId) -> Result<bool, ProcessorError> {
        let engine = &self.engine;
        let now = engine.clock.now();
        match engine
            .store
            .transition(id, &TaskStatus::DISPATCHABLE, TaskUpdate::cancelled(now))
            .await?
        {
            Some(record) => {
                engine
                    .stats
                    .record_outcome(&record.task_type, TaskStatus::Cancelled, None)
                    .await;
                info!(task_id = %id, "task cancelled");
                Ok(true)
            }
            None => match engine.store.find_by_id(id).await? {
                Some(_) => Ok(false),
                None => Err(ProcessorError::NotFound(id)),
            },
        }
    }

    /// Like [`cancel_task`](Self::cancel_task), but also interrupts a RUNNING
    /// attempt. The attempt's result is discarded and the task ends CANCELLED.
    pub async fn request_cancellation(&self, id: TaskId) -> Result<bool, ProcessorError> {
        if self.engine.running.request_cancel(id).await {
            info!(task_id = %id, "cancellation requested for running task");
            return Ok(true);
        }
        self.cancel_task(id).await
    }

    /// Stored record, with the latest in-memory progress of a running attempt.
    pub async fn get_task_status(&self, id: TaskId) -> Result<Option<TaskRecord>, ProcessorError> {
        let mut record = self.engine.store.find_by_id(id).await?;
        if let Some(record) = record.as_mut()
            && record.status == TaskStatus::Running
            && let Some((progress, message)) = self.engine.running.progress(id).await
        {
            record.progress = progress;
            if message.is_some() {
                record.progress_message = message;
            }
        }
        Ok(record)
    }

    pub async fn get_statistics(&self) -> Result<Statistics, ProcessorError> {
        let engine = &self.engine;
        let totals_by_status: BTreeMap<String, usize> = engine
            .store
            .count_by_status()
            .await?
            .into_iter()
            .map(|(status, n)| (status.as_str().to_string(), n))
            .collect();
        let live = LiveCounts {
            is_running: self.is_running().await,
            totals_by_status,
            queue_depths: engine.queues.depths().await,
            running: engine.running.len().await,
            workers: engine.config.total_workers(),
        };
        Ok(engine.stats.snapshot(live).await)
    }

    /// Newest first, optionally restricted to one owner.
    pub async fn get_task_history(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, ProcessorError> {
        Ok(self.engine.store.recent_logs(owner, limit).await?)
    }

    /// Run one scheduler sweep now. Returns the number of ids queued.
    pub async fn run_scheduler_tick(&self) -> Result<usize, ProcessorError> {
        Ok(self.engine.schedule_tick().await?)
    }

    /// Run one monitor sweep now.
    pub async fn run_monitor_tick(&self) -> MonitorReport {
        self.engine.monitor_tick().await
    }
}
