//! Document mapping between domain records and the store's native shape.
//!
//! Stores never see domain enums: priorities and statuses are lowercase
//! strings, ids are prefixed ULID strings and timestamps are RFC 3339. The
//! way back is validated, so a document written by something else (or an
//! older version) fails loudly with `StorageError::Corrupt` instead of
//! drifting silently.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ExecutionLogEntry, LogId, Priority, StorageError, TaskId, TaskRecord, TaskStatus, TaskType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub id: String,
    pub task_type: String,
    pub priority: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub max_retries: u32,
    #[serde(default)]
    pub retry_count: u32,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub scheduled_at: Option<String>,
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    pub id: String,
    pub task_id: String,
    pub task_type: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub priority: String,
    pub attempt: u32,
    pub outcome: String,
    #[serde(default)]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub recorded_at: String,
}

fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn decode_time(field: &str, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("{field}: {e}")))
}

fn decode_opt_time(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, StorageError> {
    raw.map(|raw| decode_time(field, raw)).transpose()
}

fn decode_task_id(raw: &str) -> Result<TaskId, StorageError> {
    raw.parse()
        .map_err(|e| StorageError::Corrupt(format!("task id: {e}")))
}

fn decode_status(raw: &str) -> Result<TaskStatus, StorageError> {
    raw.parse()
        .map_err(|e| StorageError::Corrupt(format!("status: {e}")))
}

fn decode_priority(raw: &str) -> Result<Priority, StorageError> {
    raw.parse()
        .map_err(|e| StorageError::Corrupt(format!("priority: {e}")))
}

impl From<&TaskRecord> for TaskDocument {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id.to_string(),
            task_type: record.task_type.as_str().to_string(),
            priority: record.priority.as_str().to_string(),
            parameters: record.parameters.clone(),
            owner: record.owner.clone(),
            depends_on: record.depends_on.iter().map(ToString::to_string).collect(),
            max_retries: record.max_retries,
            retry_count: record.retry_count,
            timeout_seconds: record.timeout_seconds,
            scheduled_at: record.scheduled_at.map(encode_time),
            status: record.status.as_str().to_string(),
            progress: record.progress,
            progress_message: record.progress_message.clone(),
            result: record.result.clone(),
            error_message: record.error_message.clone(),
            created_at: encode_time(record.created_at),
            started_at: record.started_at.map(encode_time),
            completed_at: record.completed_at.map(encode_time),
        }
    }
}

impl TryFrom<&TaskDocument> for TaskRecord {
    type Error = StorageError;

    fn try_from(doc: &TaskDocument) -> Result<Self, Self::Error> {
        if doc.task_type.is_empty() {
            return Err(StorageError::Corrupt(format!("task {}: empty task_type", doc.id)));
        }

        Ok(TaskRecord {
            id: decode_task_id(&doc.id)?,
            task_type: TaskType::new(doc.task_type.clone()),
            priority: decode_priority(&doc.priority)?,
            parameters: doc.parameters.clone(),
            owner: doc.owner.clone(),
            depends_on: doc
                .depends_on
                .iter()
                .map(|raw| decode_task_id(raw))
                .collect::<Result<_, _>>()?,
            max_retries: doc.max_retries,
            retry_count: doc.retry_count,
            timeout_seconds: doc.timeout_seconds,
            scheduled_at: decode_opt_time("scheduled_at", doc.scheduled_at.as_deref())?,
            status: decode_status(&doc.status)?,
            progress: doc.progress.clamp(0.0, 100.0),
            progress_message: doc.progress_message.clone(),
            result: doc.result.clone(),
            error_message: doc.error_message.clone(),
            created_at: decode_time("created_at", &doc.created_at)?,
            started_at: decode_opt_time("started_at", doc.started_at.as_deref())?,
            completed_at: decode_opt_time("completed_at", doc.completed_at.as_deref())?,
        })
    }
}

impl From<&ExecutionLogEntry> for LogDocument {
    fn from(entry: &ExecutionLogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            task_id: entry.task_id.to_string(),
            task_type: entry.task_type.as_str().to_string(),
            owner: entry.owner.clone(),
            priority: entry.priority.as_str().to_string(),
            attempt: entry.attempt,
            outcome: entry.outcome.as_str().to_string(),
            error_message: entry.error_message.clone(),
            duration_ms: entry.duration_ms,
            recorded_at: encode_time(entry.recorded_at),
        }
    }
}

impl TryFrom<&LogDocument> for ExecutionLogEntry {
    type Error = StorageError;

    fn try_from(doc: &LogDocument) -> Result<Self, Self::Error> {
        Ok(ExecutionLogEntry {
            id: doc
                .id
                .parse::<LogId>()
                .map_err(|e| StorageError::Corrupt(format!("log id: {e}")))?,
            task_id: decode_task_id(&doc.task_id)?,
            task_type: TaskType::new(doc.task_type.clone()),
            owner: doc.owner.clone(),
            priority: decode_priority(&doc.priority)?,
            attempt: doc.attempt,
            outcome: decode_status(&doc.outcome)?,
            error_message: doc.error_message.clone(),
            duration_ms: doc.duration_ms,
            recorded_at: decode_time("recorded_at", &doc.recorded_at)?,
        })
    }
}
