//! Data handlers: data_analysis, file_processing, database_maintenance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Simulation;
use crate::domain::HandlerError;
use crate::typed::{Handler, TaskContext, TaskParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAnalysis {
    #[serde(default)]
    pub dataset: Vec<f64>,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
}

fn default_analysis_type() -> String {
    "descriptive".to_string()
}

impl TaskParams for DataAnalysis {
    const TYPE: &'static str = "data_analysis";
}

pub struct DataAnalysisHandler {
    sim: Simulation,
}

impl DataAnalysisHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<DataAnalysis> for DataAnalysisHandler {
    async fn handle(&self, params: DataAnalysis, ctx: TaskContext) -> Result<Value, HandlerError> {
        self.sim
            .run(&ctx, &["loading dataset", "computing statistics"])
            .await?;

        let count = params.dataset.len();
        let mean = (count > 0).then(|| params.dataset.iter().sum::<f64>() / count as f64);
        let min = params.dataset.iter().copied().reduce(f64::min);
        let max = params.dataset.iter().copied().reduce(f64::max);

        Ok(json!({
            "success": true,
            "analysis_type": params.analysis_type,
            "count": count,
            "mean": mean,
            "min": min,
            "max": max,
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProcessing {
    #[serde(default = "default_file_type")]
    pub file_type: String,
    #[serde(default)]
    pub path: Option<String>,
}

fn default_file_type() -> String {
    "auto".to_string()
}

impl TaskParams for FileProcessing {
    const TYPE: &'static str = "file_processing";
}

pub struct FileProcessingHandler {
    sim: Simulation,
}

impl FileProcessingHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<FileProcessing> for FileProcessingHandler {
    async fn handle(
        &self,
        params: FileProcessing,
        ctx: TaskContext,
    ) -> Result<Value, HandlerError> {
        self.sim
            .run(&ctx, &["reading file", "parsing", "storing output"])
            .await?;

        Ok(json!({
            "success": true,
            "file_type": params.file_type,
            "path": params.path,
            "message": format!("{} file processed", params.file_type),
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMaintenance {
    #[serde(default = "default_maintenance_operation")]
    pub operation: String,
    #[serde(default)]
    pub collections: Vec<String>,
}

fn default_maintenance_operation() -> String {
    "optimize".to_string()
}

impl TaskParams for DatabaseMaintenance {
    const TYPE: &'static str = "database_maintenance";
}

pub struct DatabaseMaintenanceHandler {
    sim: Simulation,
}

impl DatabaseMaintenanceHandler {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

#[async_trait]
impl Handler<DatabaseMaintenance> for DatabaseMaintenanceHandler {
    async fn handle(
        &self,
        params: DatabaseMaintenance,
        ctx: TaskContext,
    ) -> Result<Value, HandlerError> {
        let stages: Vec<String> = if params.collections.is_empty() {
            vec![params.operation.clone()]
        } else {
            params
                .collections
                .iter()
                .map(|c| format!("{} {c}", params.operation))
                .collect()
        };
        let stages: Vec<&str> = stages.iter().map(String::as_str).collect();
        self.sim.run(&ctx, &stages).await?;

        Ok(json!({
            "success": true,
            "operation": params.operation,
            "collections": params.collections,
        }))
    }

    fn validate(&self, params: &DatabaseMaintenance) -> Result<(), String> {
        match params.operation.as_str() {
            "optimize" | "reindex" | "cleanup" | "backup" => Ok(()),
            other => Err(format!("unknown maintenance operation '{other}'")),
        }
    }
}
