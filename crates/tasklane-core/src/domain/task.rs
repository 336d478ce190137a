use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;
use super::priority::Priority;
use super::state::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A submission request. Unset limits fall back to the processor config.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_type: TaskType,
    pub parameters: serde_json::Value,
    pub priority: Priority,
    pub owner: Option<String>,
    pub depends_on: Vec<TaskId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_retries: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl NewTask {
    pub fn new(task_type: impl Into<TaskType>, parameters: serde_json::Value) -> Self {
        Self {
            task_type: task_type.into(),
            parameters,
            priority: Priority::Normal,
            owner: None,
            depends_on: Vec::new(),
            scheduled_at: None,
            max_retries: None,
            timeout_seconds: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn depends_on(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.depends_on.extend(ids);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }
}

/// One schedulable unit of work.
///
/// Identity fields (`id`, `task_type`, `priority`, `parameters`, `owner`,
/// `depends_on`, `timeout_seconds`, `max_retries`) never change after
/// creation; everything else moves only through [`TaskUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_type: TaskType,
    pub priority: Priority,
    pub parameters: serde_json::Value,
    pub owner: Option<String>,
    pub depends_on: Vec<TaskId>,
    pub max_retries: u32,
    pub retry_count: u32,
    pub timeout_seconds: u64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub progress: f64,
    pub progress_message: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Build a PENDING record. `depends_on` is de-duplicated, order kept.
    pub fn new(
        id: TaskId,
        task: NewTask,
        max_retries: u32,
        timeout_seconds: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut depends_on: Vec<TaskId> = Vec::with_capacity(task.depends_on.len());
        for dep in task.depends_on {
            if !depends_on.contains(&dep) {
                depends_on.push(dep);
            }
        }

        Self {
            id,
            task_type: task.task_type,
            priority: task.priority,
            parameters: task.parameters,
            owner: task.owner,
            depends_on,
            max_retries,
            retry_count: 0,
            timeout_seconds,
            scheduled_at: task.scheduled_at,
            status: TaskStatus::Pending,
            progress: 0.0,
            progress_message: None,
            result: None,
            error_message: None,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }

    /// Dispatchable and time-eligible. Dependencies are checked separately.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_dispatchable() && self.scheduled_at.is_none_or(|at| at <= now)
    }

    /// 1-based number of the current (or next) attempt.
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    /// Timestamp used by the retention purge.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }
}

/// Partial update merged atomically into one stored record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Option<f64>,
    pub progress_message: Option<String>,
    pub result: Option<serde_json::Value>,
    /// `Some(None)` clears a previous attempt's error.
    pub error_message: Option<Option<String>>,
    pub retry_count: Option<u32>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn running(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(TaskStatus::Running),
            started_at: Some(now),
            ..Self::default()
        }
    }

    pub fn completed(result: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            completed_at: Some(now),
            progress: Some(100.0),
            result: Some(result),
            error_message: Some(None),
            ..Self::default()
        }
    }

    pub fn retrying(retry_count: u32, scheduled_at: DateTime<Utc>, error: String) -> Self {
        Self {
            status: Some(TaskStatus::Retrying),
            retry_count: Some(retry_count),
            scheduled_at: Some(scheduled_at),
            error_message: Some(Some(error)),
            ..Self::default()
        }
    }

    pub fn failed(error: String, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            completed_at: Some(now),
            error_message: Some(Some(error)),
            ..Self::default()
        }
    }

    pub fn cancelled(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(TaskStatus::Cancelled),
            completed_at: Some(now),
            error_message: Some(Some(super::errors::CANCELLED_MESSAGE.to_string())),
            ..Self::default()
        }
    }

    /// Progress is clamped to `0.0..=100.0`.
    pub fn progress(percent: f64, message: Option<String>) -> Self {
        Self {
            progress: Some(percent.clamp(0.0, 100.0)),
            progress_message: message,
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut TaskRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(at) = self.started_at {
            record.started_at = Some(at);
        }
        if let Some(at) = self.completed_at {
            record.completed_at = Some(at);
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(message) = &self.progress_message {
            record.progress_message = Some(message.clone());
        }
        if let Some(result) = &self.result {
            record.result = Some(result.clone());
        }
        if let Some(error) = &self.error_message {
            record.error_message = error.clone();
        }
        if let Some(retry_count) = self.retry_count {
            record.retry_count = retry_count;
        }
        if let Some(at) = self.scheduled_at {
            record.scheduled_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ulid::Ulid;

    fn record(task: NewTask) -> TaskRecord {
        TaskRecord::new(TaskId::from_ulid(Ulid::new()), task, 3, 300, Utc::now())
    }

    #[test]
    fn new_record_is_pending_and_dedups_dependencies() {
        let a = TaskId::from_ulid(Ulid::new());
        let b = TaskId::from_ulid(Ulid::new());
        let rec = record(NewTask::new("noop", serde_json::json!({})).depends_on([a, b, a]));

        assert_eq!(rec.status, TaskStatus::Pending);
        assert_eq!(rec.depends_on, vec![a, b]);
        assert_eq!(rec.attempt(), 1);
    }

    #[test]
    fn due_respects_scheduled_at() {
        let now = Utc::now();
        let later = record(
            NewTask::new("noop", serde_json::json!({})).scheduled_at(now + Duration::seconds(30)),
        );
        assert!(!later.is_due(now));
        assert!(later.is_due(now + Duration::seconds(31)));

        let immediate = record(NewTask::new("noop", serde_json::json!({})));
        assert!(immediate.is_due(now));
    }

    #[test]
    fn completed_update_clears_previous_error() {
        let mut rec = record(NewTask::new("noop", serde_json::json!({})));
        let now = Utc::now();

        TaskUpdate::retrying(1, now, "flaky".into()).apply(&mut rec);
        assert_eq!(rec.error_message.as_deref(), Some("flaky"));

        TaskUpdate::completed(serde_json::json!({"success": true}), now).apply(&mut rec);
        assert_eq!(rec.status, TaskStatus::Completed);
        assert_eq!(rec.error_message, None);
        assert_eq!(rec.progress, 100.0);
        assert_eq!(rec.retry_count, 1);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(TaskUpdate::progress(140.0, None).progress, Some(100.0));
        assert_eq!(TaskUpdate::progress(-3.0, None).progress, Some(0.0));
    }
}
