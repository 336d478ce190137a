//! Fallback for task types nobody registered.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::HandlerError;
use crate::typed::{TaskContext, TaskHandler};

/// Echoes the parameters back after a nominal delay.
#[derive(Debug, Clone)]
pub struct GenericHandler {
    delay: Duration,
}

impl GenericHandler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for GenericHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[async_trait]
impl TaskHandler for GenericHandler {
    async fn handle(&self, parameters: Value, ctx: TaskContext) -> Result<Value, HandlerError> {
        debug!(task_id = %ctx.task_id(), task_type = %ctx.task_type(), "no dedicated handler, using generic");
        tokio::time::sleep(self.delay).await;
        ctx.report_progress(100.0, "processed").await;
        Ok(json!({
            "success": true,
            "task_type": ctx.task_type().as_str(),
            "parameters": parameters,
            "message": "Task processed by generic handler",
        }))
    }
}
