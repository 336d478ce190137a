//! Statistics - 実行統計（メモリ上の派生キャッシュ）
//!
//! 件数の正本は TaskStore。ここで持つのはプロセス起動後のカウンタ、
//! 平均実行時間（指数移動平均）だけ。稼働率は snapshot 時に計算する。

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::{Priority, TaskStatus, TaskType};

/// Weight of the previous average.
const EMA_DECAY: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounters {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub cancelled: u64,
}

#[derive(Debug, Default)]
struct StatsState {
    submitted: u64,
    completed: u64,
    failed: u64,
    retried: u64,
    cancelled: u64,
    by_type: BTreeMap<String, TypeCounters>,
    average_execution: Option<f64>,
}

/// Point-in-time view returned by `Processor::get_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub is_running: bool,
    /// Persisted records per status.
    pub totals_by_status: BTreeMap<String, usize>,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub cancelled: u64,
    pub by_type: BTreeMap<String, TypeCounters>,
    pub average_execution_ms: f64,
    pub queue_depths: BTreeMap<Priority, usize>,
    pub running: usize,
    pub workers: usize,
    /// `running / workers`, in `0.0..=1.0`.
    pub utilization: f64,
}

/// Live process-local counters.
#[derive(Debug, Clone, Default)]
pub struct LiveCounts {
    pub is_running: bool,
    pub totals_by_status: BTreeMap<String, usize>,
    pub queue_depths: BTreeMap<Priority, usize>,
    pub running: usize,
    pub workers: usize,
}

pub(crate) fn ema(previous: Option<f64>, sample: f64) -> f64 {
    match previous {
        Some(avg) => EMA_DECAY * avg + (1.0 - EMA_DECAY) * sample,
        None => sample,
    }
}

#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: Mutex<StatsState>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_submitted(&self, task_type: &TaskType) {
        let mut s = self.inner.lock().await;
        s.submitted += 1;
        s.by_type.entry(task_type.to_string()).or_default().submitted += 1;
    }

    /// Count one settled attempt. `elapsed` is `None` when nothing executed.
    pub async fn record_outcome(
        &self,
        task_type: &TaskType,
        outcome: TaskStatus,
        elapsed: Option<Duration>,
    ) {
        let mut s = self.inner.lock().await;
        let counters = s.by_type.entry(task_type.to_string()).or_default();
        match outcome {
            TaskStatus::Completed => counters.completed += 1,
            TaskStatus::Failed => counters.failed += 1,
            TaskStatus::Retrying => counters.retried += 1,
            TaskStatus::Cancelled => counters.cancelled += 1,
            _ => {}
        }
        match outcome {
            TaskStatus::Completed => s.completed += 1,
            TaskStatus::Failed => s.failed += 1,
            TaskStatus::Retrying => s.retried += 1,
            TaskStatus::Cancelled => s.cancelled += 1,
            _ => {}
        }
        if let Some(elapsed) = elapsed {
            let sample = elapsed.as_secs_f64() * 1000.0;
            s.average_execution = Some(ema(s.average_execution, sample));
        }
    }

    pub async fn snapshot(&self, live: LiveCounts) -> Statistics {
        let s = self.inner.lock().await;
        Statistics {
            is_running: live.is_running,
            totals_by_status: live.totals_by_status,
            submitted: s.submitted,
            completed: s.completed,
            failed: s.failed,
            retried: s.retried,
            cancelled: s.cancelled,
            by_type: s.by_type.clone(),
            average_execution_ms: s.average_execution.unwrap_or(0.0),
            queue_depths: live.queue_depths,
            running: live.running,
            workers: live.workers,
            utilization: live.running as f64 / live.workers.max(1) as f64,
        }
    }
}
