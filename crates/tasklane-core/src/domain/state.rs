//! Task state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Task status.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Retrying -> Running ... (until max_retries)
/// - Pending -> Running -> Failed (retries exhausted)
/// - Pending | Retrying -> Cancelled (before dispatch)
/// - Running -> Cancelled (cancellation observed mid-execution)
///
/// `Paused` is never entered by the processor itself; a paused record is
/// simply not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Retrying,
    Paused,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
        TaskStatus::Retrying,
        TaskStatus::Paused,
    ];

    /// Terminal states only leave the store through the retention purge.
    pub const TERMINAL: [TaskStatus; 3] = [
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// States the scheduler may promote into a queue lane.
    pub const DISPATCHABLE: [TaskStatus; 2] = [TaskStatus::Pending, TaskStatus::Retrying];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn is_dispatchable(self) -> bool {
        Self::DISPATCHABLE.contains(&self)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Retrying, Running)
                | (Running, Completed)
                | (Running, Retrying)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Pending, Cancelled)
                | (Retrying, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Unknown status string read back from a store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
