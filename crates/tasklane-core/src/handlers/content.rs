//! Content handlers: web_scraping, report_generation, email_processing, social_media.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Simulation;
use crate::domain::HandlerError;
use crate::typed::{Handler, TaskContext, TaskParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebScraping {
    pub url: String,
    #[serde(default)]
    pub selectors: Vec<String>,
}

impl TaskParams for WebScraping {
    const TYPE: &'static str = "web_scraping";
}

pub struct WebScrapingHandler {
    sim: Simulation,
}

impl WebScrapingHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<WebScraping> for WebScrapingHandler {
    async fn handle(&self, params: WebScraping, ctx: TaskContext) -> Result<Value, HandlerError> {
        self.sim
            .run(&ctx, &["fetching page", "extracting content"])
            .await?;
        let extracted: Vec<Value> = params
            .selectors
            .iter()
            .map(|s| json!({ "selector": s, "matches": 0 }))
            .collect();

        Ok(json!({
            "success": true,
            "url": params.url,
            "extracted": extracted,
        }))
    }

    fn validate(&self, params: &WebScraping) -> Result<(), String> {
        if !(params.url.starts_with("http://") || params.url.starts_with("https://")) {
            return Err(format!("unsupported url '{}'", params.url));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportGeneration {
    #[serde(default = "default_report_type")]
    pub report_type: String,
    #[serde(default)]
    pub sections: Vec<String>,
}

fn default_report_type() -> String {
    "summary".to_string()
}

impl TaskParams for ReportGeneration {
    const TYPE: &'static str = "report_generation";
}

pub struct ReportGenerationHandler {
    sim: Simulation,
}

impl ReportGenerationHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<ReportGeneration> for ReportGenerationHandler {
    async fn handle(
        &self,
        params: ReportGeneration,
        ctx: TaskContext,
    ) -> Result<Value, HandlerError> {
        self.sim
            .run(&ctx, &["collecting data", "rendering", "publishing"])
            .await?;

        Ok(json!({
            "success": true,
            "report_type": params.report_type,
            "sections": params.sections.len(),
            "report_id": format!("report-{}", ctx.task_id().as_ulid()),
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailProcessing {
    #[serde(default = "default_email_action")]
    pub action: String,
    #[serde(default)]
    pub message_ids: Vec<String>,
}

fn default_email_action() -> String {
    "summarize".to_string()
}

impl TaskParams for EmailProcessing {
    const TYPE: &'static str = "email_processing";
}

pub struct EmailProcessingHandler {
    sim: Simulation,
}

impl EmailProcessingHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<EmailProcessing> for EmailProcessingHandler {
    async fn handle(
        &self,
        params: EmailProcessing,
        ctx: TaskContext,
    ) -> Result<Value, HandlerError> {
        self.sim.run(&ctx, &["reading mailbox", "processing"]).await?;

        Ok(json!({
            "success": true,
            "action": params.action,
            "processed": params.message_ids.len(),
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialMedia {
    pub platform: String,
    #[serde(default = "default_social_action")]
    pub action: String,
    #[serde(default)]
    pub content: Option<String>,
}

fn default_social_action() -> String {
    "analyze".to_string()
}

impl TaskParams for SocialMedia {
    const TYPE: &'static str = "social_media";
}

pub struct SocialMediaHandler {
    sim: Simulation,
}

impl SocialMediaHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<SocialMedia> for SocialMediaHandler {
    async fn handle(&self, params: SocialMedia, ctx: TaskContext) -> Result<Value, HandlerError> {
        if params.action == "post" && params.content.is_none() {
            return Err(HandlerError::InvalidParameters(
                "post requires content".to_string(),
            ));
        }
        self.sim
            .run(&ctx, &["connecting", "performing action"])
            .await?;

        Ok(json!({
            "success": true,
            "platform": params.platform,
            "action": params.action,
        }))
    }

    fn validate(&self, params: &SocialMedia) -> Result<(), String> {
        if params.platform.is_empty() {
            return Err("platform must not be empty".to_string());
        }
        Ok(())
    }
}
