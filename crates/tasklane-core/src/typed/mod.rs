//! Typed - 型付き Task API
//!
//! task_type の typo を型で排除し、ハンドラとの対応付けを静的に保証する。
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskParams` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `TaskHandler` trait - object-safe, type erasure

pub mod context;
pub mod handler;
pub mod registry;
pub mod task;

pub use self::context::{ProgressSink, TaskContext};
pub use self::handler::{Handler, TaskHandler, TypedHandler};
pub use self::registry::{HandlerRegistry, RegistryError};
pub use self::task::TaskParams;
