#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use tasklane_core::app::Statistics;
use tasklane_core::domain::{ExecutionLogEntry, HandlerError, TaskId, TaskRecord, TaskStatus};
use tasklane_core::handlers::{Simulation, register_builtin_handlers_with};
use tasklane_core::impls::CannedAiBackend;
use tasklane_core::typed::{Handler, TaskContext, TaskParams};
use tasklane_core::{Processor, ProcessorBuilder, ProcessorConfig};

pub fn fast_config() -> ProcessorConfig {
    ProcessorConfig {
        max_workers: 4,
        scheduler_interval: Duration::from_millis(20),
        monitor_interval: Duration::from_millis(50),
        pop_wait: Duration::from_millis(20),
        retry_base_delay: Duration::from_millis(10),
        retry_max_delay: Duration::from_millis(100),
        ..ProcessorConfig::default()
    }
}

/// Builtins at a fast pace plus the test handlers below.
pub fn builder(config: ProcessorConfig, probe: &Probe) -> ProcessorBuilder {
    let ai = Arc::new(CannedAiBackend::new());
    register_builtin_handlers_with(
        ProcessorBuilder::new().config(config),
        ai,
        Simulation::new(Duration::from_millis(5)),
    )
    .unwrap()
    .register::<AlwaysFails, _>(AlwaysFailsHandler)
    .unwrap()
    .register::<Sleep, _>(SleepHandler)
    .unwrap()
    .register::<Record, _>(RecordHandler {
        probe: probe.clone(),
    })
    .unwrap()
    .register::<Gated, _>(GatedHandler {
        probe: probe.clone(),
    })
    .unwrap()
    .register::<UntilCancelled, _>(UntilCancelledHandler)
    .unwrap()
}

pub fn processor(config: ProcessorConfig) -> (Arc<Processor>, Probe) {
    let probe = Probe::default();
    let processor = builder(config, &probe).build().unwrap();
    (Arc::new(processor), probe)
}

/// Shared observation point for the test handlers.
#[derive(Clone, Default)]
pub struct Probe {
    pub order: Arc<Mutex<Vec<u32>>>,
    pub open: Arc<AtomicBool>,
    /// Gated handlers that returned.
    pub finished: Arc<AtomicUsize>,
}

impl Probe {
    pub fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub async fn order(&self) -> Vec<u32> {
        self.order.lock().await.clone()
    }
}

pub async fn wait_for(
    processor: &Processor,
    id: TaskId,
    within: Duration,
    done: impl Fn(&TaskRecord) -> bool,
) -> TaskRecord {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let record = processor
            .get_task_status(id)
            .await
            .unwrap()
            .expect("task exists");
        if done(&record) {
            return record;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task {id} still {} after {within:?}", record.status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_status(
    processor: &Processor,
    id: TaskId,
    status: TaskStatus,
    within: Duration,
) -> TaskRecord {
    wait_for(processor, id, within, |r| r.status == status).await
}

/// History and stats are written right after the status, so poll for them too.
pub async fn history_of(
    processor: &Processor,
    owner: &str,
    len: usize,
    within: Duration,
) -> Vec<ExecutionLogEntry> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let entries = processor.get_task_history(Some(owner), 100).await.unwrap();
        if entries.len() >= len {
            return entries;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("only {} history entries for {owner} after {within:?}", entries.len());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn stats_when(
    processor: &Processor,
    within: Duration,
    done: impl Fn(&Statistics) -> bool,
) -> Statistics {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let stats = processor.get_statistics().await.unwrap();
        if done(&stats) {
            return stats;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("statistics never matched: {stats:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlwaysFails {}

impl TaskParams for AlwaysFails {
    const TYPE: &'static str = "test.always_fails";
}

struct AlwaysFailsHandler;

#[async_trait]
impl Handler<AlwaysFails> for AlwaysFailsHandler {
    async fn handle(&self, _params: AlwaysFails, _ctx: TaskContext) -> Result<Value, HandlerError> {
        Err(HandlerError::failed("boom"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Sleep {
    pub millis: u64,
}

impl TaskParams for Sleep {
    const TYPE: &'static str = "test.sleep";
}

struct SleepHandler;

#[async_trait]
impl Handler<Sleep> for SleepHandler {
    async fn handle(&self, params: Sleep, _ctx: TaskContext) -> Result<Value, HandlerError> {
        tokio::time::sleep(Duration::from_millis(params.millis)).await;
        Ok(json!({ "success": true, "slept_ms": params.millis }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Record {
    pub seq: u32,
}

impl TaskParams for Record {
    const TYPE: &'static str = "test.record";
}

struct RecordHandler {
    probe: Probe,
}

#[async_trait]
impl Handler<Record> for RecordHandler {
    async fn handle(&self, params: Record, _ctx: TaskContext) -> Result<Value, HandlerError> {
        self.probe.order.lock().await.push(params.seq);
        Ok(json!({ "success": true }))
    }
}

/// Blocks until `Probe::release`, ignoring cancellation.
#[derive(Debug, Serialize, Deserialize)]
pub struct Gated {}

impl TaskParams for Gated {
    const TYPE: &'static str = "test.gated";
}

struct GatedHandler {
    probe: Probe,
}

#[async_trait]
impl Handler<Gated> for GatedHandler {
    async fn handle(&self, _params: Gated, _ctx: TaskContext) -> Result<Value, HandlerError> {
        while !self.probe.open.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.probe.finished.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "success": true }))
    }
}

/// Reports 50%, waits for its cancellation signal, then reports success anyway.
#[derive(Debug, Serialize, Deserialize)]
pub struct UntilCancelled {}

impl TaskParams for UntilCancelled {
    const TYPE: &'static str = "test.until_cancelled";
}

struct UntilCancelledHandler;

#[async_trait]
impl Handler<UntilCancelled> for UntilCancelledHandler {
    async fn handle(
        &self,
        _params: UntilCancelled,
        ctx: TaskContext,
    ) -> Result<Value, HandlerError> {
        ctx.report_progress(50.0, "waiting for cancel").await;
        ctx.cancelled().await;
        Ok(json!({ "success": true, "ignored_cancel": true }))
    }
}
