//! Integration handlers: integration_sync, workflow_execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Simulation;
use crate::domain::HandlerError;
use crate::typed::{Handler, TaskContext, TaskParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Pull,
    Push,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSync {
    pub integration: String,
    #[serde(default = "default_direction")]
    pub direction: SyncDirection,
}

fn default_direction() -> SyncDirection {
    SyncDirection::Pull
}

impl TaskParams for IntegrationSync {
    const TYPE: &'static str = "integration_sync";
}

pub struct IntegrationSyncHandler {
    sim: Simulation,
}

impl IntegrationSyncHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<IntegrationSync> for IntegrationSyncHandler {
    async fn handle(
        &self,
        params: IntegrationSync,
        ctx: TaskContext,
    ) -> Result<Value, HandlerError> {
        let stages: &[&str] = match params.direction {
            SyncDirection::Pull => &["authenticating", "pulling changes"],
            SyncDirection::Push => &["authenticating", "pushing changes"],
            SyncDirection::Both => &["authenticating", "pulling changes", "pushing changes"],
        };
        self.sim.run(&ctx, stages).await?;

        Ok(json!({
            "success": true,
            "integration": params.integration,
            "direction": params.direction,
        }))
    }

    fn validate(&self, params: &IntegrationSync) -> Result<(), String> {
        if params.integration.trim().is_empty() {
            return Err("integration must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub steps: Vec<String>,
}

impl TaskParams for WorkflowExecution {
    const TYPE: &'static str = "workflow_execution";
}

pub struct WorkflowExecutionHandler {
    sim: Simulation,
}

impl WorkflowExecutionHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<WorkflowExecution> for WorkflowExecutionHandler {
    async fn handle(
        &self,
        params: WorkflowExecution,
        ctx: TaskContext,
    ) -> Result<Value, HandlerError> {
        let steps: Vec<&str> = params.steps.iter().map(String::as_str).collect();
        self.sim.run(&ctx, &steps).await?;

        Ok(json!({
            "success": true,
            "workflow_id": params.workflow_id,
            "steps_completed": steps.len(),
        }))
    }

    fn validate(&self, params: &WorkflowExecution) -> Result<(), String> {
        if params.steps.is_empty() {
            return Err("workflow needs at least one step".to_string());
        }
        Ok(())
    }
}
