//! ai_processing - AiBackend に生成を委譲する

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Simulation;
use crate::domain::HandlerError;
use crate::ports::AiBackend;
use crate::typed::{Handler, TaskContext, TaskParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProcessing {
    pub prompt: String,
    /// Free-form; passed to the backend untouched.
    #[serde(default)]
    pub context: Value,
    #[serde(default = "default_operation")]
    pub operation: String,
}

fn default_operation() -> String {
    "generate".to_string()
}

impl TaskParams for AiProcessing {
    const TYPE: &'static str = "ai_processing";
}

pub struct AiProcessingHandler {
    ai: Arc<dyn AiBackend>,
    sim: Simulation,
}

impl AiProcessingHandler {
    pub fn new(ai: Arc<dyn AiBackend>, sim: Simulation) -> Self {
        Self { ai, sim }
    }
}

#[async_trait]
impl Handler<AiProcessing> for AiProcessingHandler {
    async fn handle(&self, params: AiProcessing, ctx: TaskContext) -> Result<Value, HandlerError> {
        self.sim.run(&ctx, &["preparing prompt"]).await?;
        let output = self.ai.generate(&params.prompt, &params.context).await?;
        ctx.report_progress(100.0, "response received").await;

        Ok(json!({
            "success": true,
            "operation": params.operation,
            "output": output,
        }))
    }

    fn validate(&self, params: &AiProcessing) -> Result<(), String> {
        if params.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{ctx, fast};
    use crate::impls::CannedAiBackend;

    fn handler() -> AiProcessingHandler {
        let ai = CannedAiBackend::new().with_response("summarize", "short version");
        AiProcessingHandler::new(Arc::new(ai), fast())
    }

    #[tokio::test]
    async fn output_comes_from_the_backend() {
        let (ctx, _) = ctx(AiProcessing::TYPE);
        let params = AiProcessing {
            prompt: "summarize".into(),
            context: Value::Null,
            operation: default_operation(),
        };
        let out = handler().handle(params, ctx).await.unwrap();
        assert_eq!(out["output"], "short version");
        assert_eq!(out["operation"], "generate");
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let params = AiProcessing {
            prompt: "   ".into(),
            context: Value::Null,
            operation: default_operation(),
        };
        assert!(handler().validate(&params).is_err());
    }
}
