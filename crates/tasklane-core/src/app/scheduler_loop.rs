//! SchedulerLoop - 実行可能な永続タスクを queue に載せる
//!
//! # tick
//! 1. PENDING / RETRYING かつ `scheduled_at` を過ぎたレコードを取得
//! 2. queue 済み・実行中の id は飛ばす
//! 3. 依存がすべて COMPLETED のものだけ残す（tick 内で依存の参照結果をキャッシュ）
//! 4. (priority, created_at) 順に try_push。満杯の lane は次の tick まで待つ
//!
//! `Processor::start()` でも一度同期的に実行され、前回プロセスの取り残しを拾う。

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::engine::Engine;
use crate::domain::{StorageError, TaskId, TaskRecord, TaskStatus};

pub(crate) async fn run_scheduler(engine: Arc<Engine>, shutdown: CancellationToken) {
    let interval = engine.config.scheduler_interval;
    info!(?interval, "scheduler started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                match engine.schedule_tick().await {
                    Ok(0) => {}
                    Ok(n) => debug!(queued = n, "scheduler tick"),
                    Err(e) => error!(error = %e, "scheduler tick failed"),
                }
            }
        }
    }
    info!("scheduler stopped");
}

impl Engine {
    /// One sweep. Returns the number of ids newly queued.
    pub(crate) async fn schedule_tick(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let ready = self
            .store
            .find_ready(&TaskStatus::DISPATCHABLE, now)
            .await?;

        let mut resolved: HashMap<TaskId, bool> = HashMap::new();
        let mut eligible: Vec<TaskRecord> = Vec::new();
        for record in ready {
            if self.running.contains(record.id).await || self.queues.contains(record.id).await {
                continue;
            }
            if !self.dependencies_met(&record, &mut resolved).await? {
                continue;
            }
            eligible.push(record);
        }
        eligible.sort_by_key(|r| (r.priority, r.created_at, r.id));

        let mut queued = 0;
        for record in eligible {
            match self.queues.try_push(record.priority, record.id).await {
                Ok(true) => queued += 1,
                Ok(false) => {}
                Err(e) => debug!(task_id = %record.id, reason = %e, "not queued this tick"),
            }
        }
        Ok(queued)
    }

    async fn dependencies_met(
        &self,
        record: &TaskRecord,
        resolved: &mut HashMap<TaskId, bool>,
    ) -> Result<bool, StorageError> {
        for dep in &record.depends_on {
            let done = match resolved.get(dep) {
                Some(&done) => done,
                None => {
                    let done = self
                        .store
                        .find_by_id(*dep)
                        .await?
                        .is_some_and(|d| d.status == TaskStatus::Completed);
                    resolved.insert(*dep, done);
                    done
                }
            };
            if !done {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
