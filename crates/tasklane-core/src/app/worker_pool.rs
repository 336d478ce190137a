//! WorkerPool - 優先度ごとの専用ワーカー割り当て
//!
//! 各 lane に最低 1 つのワーカーがつくので、低優先度の滞留が
//! 高優先度の dispatch を遅らせることはない（逆も同じ）。

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::engine::Engine;
use super::worker_loop::run_worker;
use crate::config::ProcessorConfig;
use crate::domain::Priority;

/// Worker count per class, highest priority first.
pub fn allocation(config: &ProcessorConfig) -> Vec<(Priority, usize)> {
    Priority::ALL
        .into_iter()
        .map(|p| (p, config.workers_for(p)))
        .collect()
}

/// Spawn every worker into `tasks`. Returns how many were started.
pub(crate) fn spawn_workers(
    engine: &Arc<Engine>,
    shutdown: &CancellationToken,
    tasks: &mut JoinSet<()>,
) -> usize {
    let plan = allocation(&engine.config);
    let mut started = 0;
    for &(priority, count) in &plan {
        for worker_no in 0..count {
            tasks.spawn(run_worker(
                Arc::clone(engine),
                priority,
                worker_no,
                shutdown.clone(),
            ));
            started += 1;
        }
    }
    info!(workers = started, ?plan, "worker pool started");
    started
}
