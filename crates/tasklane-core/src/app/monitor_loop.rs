//! MonitorLoop - 稼働率・stuck 検出・orphan 回収・保持期間パージ
//!
//! # tick（この順で実行、各ステップの失敗はログだけ残して次へ進む）
//! 1. utilization = 実行中 / ワーカー総数
//! 2. claim から timeout + buffer を超えた実行中 attempt を worker から取り上げて失敗扱い
//! 3. ストア上 RUNNING だがどのワーカーも持っていないレコードを失敗扱い
//! 4. 古い終端レコードと実行履歴を削除
//! 5. lane ごとの queue 深さを記録

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::engine::{Engine, Settlement};
use super::running::attempt_deadline;
use crate::domain::{FailureKind, StorageError, TaskStatus};

/// What one monitor tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    pub utilization: f64,
    pub stuck: usize,
    pub orphaned: usize,
    pub purged_tasks: usize,
    pub purged_logs: usize,
}

pub(crate) async fn run_monitor(engine: Arc<Engine>, shutdown: CancellationToken) {
    let interval = engine.config.monitor_interval;
    info!(?interval, "monitor started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let report = engine.monitor_tick().await;
                debug!(?report, "monitor tick");
            }
        }
    }
    info!("monitor stopped");
}

fn before(now: DateTime<Utc>, age: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
}

impl Engine {
    pub(crate) async fn monitor_tick(&self) -> MonitorReport {
        let mut report = MonitorReport::default();
        let buffer = self.config.stuck_buffer;

        let workers = self.config.total_workers().max(1);
        report.utilization = self.running.len().await as f64 / workers as f64;

        for entry in self.running.take_stuck(self.clock.now(), buffer).await {
            entry.cancel.cancel();
            warn!(
                task_id = %entry.record.id,
                task_type = %entry.record.task_type,
                elapsed_ms = entry.started.elapsed().as_millis() as u64,
                "stuck task taken over by monitor"
            );
            self.settle(
                &entry.record,
                entry.started.elapsed(),
                Settlement::Failed(FailureKind::Stuck),
            )
            .await;
            report.stuck += 1;
        }

        match self.reap_orphans(buffer).await {
            Ok(n) => report.orphaned = n,
            Err(e) => error!(error = %e, "orphan scan failed"),
        }

        let now = self.clock.now();
        if let Some(cutoff) = before(now, self.config.task_retention) {
            match self
                .store
                .delete_older_than(&TaskStatus::TERMINAL, cutoff)
                .await
            {
                Ok(n) => report.purged_tasks = n,
                Err(e) => error!(error = %e, "task retention purge failed"),
            }
        }
        if let Some(cutoff) = before(now, self.config.log_retention) {
            match self.store.delete_logs_older_than(cutoff).await {
                Ok(n) => report.purged_logs = n,
                Err(e) => error!(error = %e, "log retention purge failed"),
            }
        }
        if report.purged_tasks > 0 || report.purged_logs > 0 {
            info!(
                tasks = report.purged_tasks,
                logs = report.purged_logs,
                "retention purge"
            );
        }

        let depths = self.queues.depths().await;
        debug!(?depths, utilization = report.utilization, "queue depths");

        report
    }

    /// RUNNING records no in-process worker owns, past their deadline.
    async fn reap_orphans(&self, buffer: Duration) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let mut reaped = 0;
        for record in self.store.find_by_status(&[TaskStatus::Running]).await? {
            if self.running.contains(record.id).await {
                continue;
            }
            if attempt_deadline(&record, buffer).is_none_or(|deadline| now <= deadline) {
                continue;
            }
            let started_at = record.started_at.unwrap_or(record.created_at);
            warn!(task_id = %record.id, %started_at, "orphaned RUNNING record reaped");
            let elapsed = (now - started_at).to_std().unwrap_or_default();
            self.settle(&record, elapsed, Settlement::Failed(FailureKind::Stuck))
                .await;
            reaped += 1;
        }
        Ok(reaped)
    }
}
