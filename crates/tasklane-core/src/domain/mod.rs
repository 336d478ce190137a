//! Domain model (IDs, priorities, task records, state machine, errors, history).
//!
//! ここには I/O を含めない。永続化は `ports::TaskStore`、実行は `app` が担当。

pub mod errors;
pub mod history;
pub mod ids;
pub mod priority;
pub mod state;
pub mod task;

pub use self::errors::{
    CANCELLED_MESSAGE, FailureKind, HandlerError, ProcessorError, StorageError, ValidationError,
};
pub use self::history::ExecutionLogEntry;
pub use self::ids::{LogId, ParseIdError, TaskId};
pub use self::priority::Priority;
pub use self::state::{TaskStatus, UnknownStatus};
pub use self::task::{NewTask, TaskRecord, TaskType, TaskUpdate};
