//! Errors - エラー型と分類
//!
//! - `ValidationError`: submit 時に同期的に拒否（永続化しない）
//! - `StorageError`: TaskStore の障害（ループの次の tick がリトライ）
//! - `HandlerError` / `FailureKind`: 実行失敗（RETRYING / FAILED に吸収される）

use thiserror::Error;

use super::ids::TaskId;

/// Persisted message of a task cancelled before or during execution.
pub const CANCELLED_MESSAGE: &str = "Task was cancelled";

/// Malformed submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task_type must not be empty")]
    EmptyTaskType,

    #[error("timeout_seconds must be greater than zero")]
    ZeroTimeout,

    #[error("unknown priority '{0}'")]
    UnknownPriority(String),

    #[error("invalid parameters for task_type={task_type}: {reason}")]
    InvalidParameters { task_type: String, reason: String },
}

/// Failure of the persistence boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duplicate task id {0}")]
    Duplicate(TaskId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Error returned by a task handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Why an attempt did not complete. Every variant drives the same
/// RUNNING -> RETRYING / FAILED path; only the persisted message differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Handler(String),
    Timeout,
    Stuck,
    Panicked(String),
}

impl FailureKind {
    pub fn message(&self) -> String {
        match self {
            FailureKind::Handler(message) => message.clone(),
            FailureKind::Timeout => "execution timeout".to_string(),
            FailureKind::Stuck => "stuck - exceeded timeout with buffer".to_string(),
            FailureKind::Panicked(message) => format!("handler panicked: {message}"),
        }
    }
}

impl From<HandlerError> for FailureKind {
    fn from(err: HandlerError) -> Self {
        FailureKind::Handler(err.to_string())
    }
}

/// Error surfaced by the processor facade.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("task {0} not found")]
    NotFound(TaskId),
}
