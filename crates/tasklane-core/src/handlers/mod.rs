//! Handlers - 組み込みのシミュレーションハンドラ
//!
//! 業務ロジックは本物ではない。数ステップ待って進捗を報告し、
//! `{"success": true, ...}` 形の結果を返すだけ。
//! 差し替えたい task_type は `ProcessorBuilder` で別のハンドラを登録する。

pub mod ai;
pub mod content;
pub mod data;
pub mod generic;
pub mod integration;

use std::sync::Arc;
use std::time::Duration;

use crate::app::ProcessorBuilder;
use crate::domain::HandlerError;
use crate::ports::AiBackend;
use crate::typed::{RegistryError, TaskContext};

pub use self::ai::{AiProcessing, AiProcessingHandler};
pub use self::content::{
    EmailProcessing, EmailProcessingHandler, ReportGeneration, ReportGenerationHandler,
    SocialMedia, SocialMediaHandler, WebScraping, WebScrapingHandler,
};
pub use self::data::{
    DataAnalysis, DataAnalysisHandler, DatabaseMaintenance, DatabaseMaintenanceHandler,
    FileProcessing, FileProcessingHandler,
};
pub use self::generic::GenericHandler;
pub use self::integration::{
    IntegrationSync, IntegrationSyncHandler, WorkflowExecution, WorkflowExecutionHandler,
};

/// Task types wired by [`register_builtin_handlers`].
pub const BUILTIN_TASK_TYPES: [&str; 10] = [
    "ai_processing",
    "web_scraping",
    "data_analysis",
    "file_processing",
    "integration_sync",
    "workflow_execution",
    "report_generation",
    "email_processing",
    "social_media",
    "database_maintenance",
];

/// Pace of a simulated handler: one sleep of `step` per reported stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simulation {
    step: Duration,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Simulation {
    pub fn new(step: Duration) -> Self {
        Self { step }
    }

    /// Sleep through `stages`, reporting progress after each one.
    pub(crate) async fn run(
        &self,
        ctx: &TaskContext,
        stages: &[&str],
    ) -> Result<(), HandlerError> {
        let total = stages.len().max(1);
        for (done, stage) in stages.iter().enumerate() {
            if ctx.is_cancelled() {
                return Err(HandlerError::failed(format!("interrupted during {stage}")));
            }
            tokio::time::sleep(self.step).await;
            let percent = ((done + 1) * 100 / total) as f64;
            ctx.report_progress(percent, *stage).await;
        }
        Ok(())
    }
}

/// Register every built-in handler with the default pace.
pub fn register_builtin_handlers(
    builder: ProcessorBuilder,
    ai: Arc<dyn AiBackend>,
) -> Result<ProcessorBuilder, RegistryError> {
    register_builtin_handlers_with(builder, ai, Simulation::default())
}

pub fn register_builtin_handlers_with(
    builder: ProcessorBuilder,
    ai: Arc<dyn AiBackend>,
    sim: Simulation,
) -> Result<ProcessorBuilder, RegistryError> {
    builder
        .register::<AiProcessing, _>(AiProcessingHandler::new(ai, sim))?
        .register::<WebScraping, _>(WebScrapingHandler::new(sim))?
        .register::<DataAnalysis, _>(DataAnalysisHandler::new(sim))?
        .register::<FileProcessing, _>(FileProcessingHandler::new(sim))?
        .register::<IntegrationSync, _>(IntegrationSyncHandler::new(sim))?
        .register::<WorkflowExecution, _>(WorkflowExecutionHandler::new(sim))?
        .register::<ReportGeneration, _>(ReportGenerationHandler::new(sim))?
        .register::<EmailProcessing, _>(EmailProcessingHandler::new(sim))?
        .register::<SocialMedia, _>(SocialMediaHandler::new(sim))?
        .register::<DatabaseMaintenance, _>(DatabaseMaintenanceHandler::new(sim))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;
    use ulid::Ulid;

    use super::Simulation;
    use crate::domain::{TaskId, TaskType};
    use crate::typed::{ProgressSink, TaskContext};

    pub fn fast() -> Simulation {
        Simulation::new(Duration::from_millis(1))
    }

    #[derive(Default)]
    pub struct Progress(pub Mutex<Vec<f64>>);

    #[async_trait]
    impl ProgressSink for Progress {
        async fn report(&self, _task_id: TaskId, percent: f64, _message: Option<String>) {
            self.0.lock().await.push(percent);
        }
    }

    pub fn ctx(task_type: &str) -> (TaskContext, Arc<Progress>) {
        let progress = Arc::new(Progress::default());
        let ctx = TaskContext::new(
            TaskId::from_ulid(Ulid::new()),
            TaskType::new(task_type),
            1,
            CancellationToken::new(),
            progress.clone(),
        );
        (ctx, progress)
    }
}
