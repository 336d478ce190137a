//! Execution history: one entry per finished attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LogId, TaskId};
use super::priority::Priority;
use super::state::TaskStatus;
use super::task::{TaskRecord, TaskType};

/// What happened to one attempt of a task.
///
/// `outcome` is the status the task moved to when the attempt ended
/// (Completed, Retrying, Failed or Cancelled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: LogId,
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub owner: Option<String>,
    pub priority: Priority,
    pub attempt: u32,
    pub outcome: TaskStatus,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionLogEntry {
    pub fn for_attempt(
        id: LogId,
        task: &TaskRecord,
        outcome: TaskStatus,
        error_message: Option<String>,
        duration_ms: u64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id: task.id,
            task_type: task.task_type.clone(),
            owner: task.owner.clone(),
            priority: task.priority,
            attempt: task.attempt(),
            outcome,
            error_message,
            duration_ms,
            recorded_at,
        }
    }
}
