//! App - アプリケーション層
//!
//! ports を組み合わせて処理系を組み立てる。
//!
//! # 主要コンポーネント
//! - **ProcessorBuilder**: 構築とワイヤリング（起動時検証）
//! - **Processor**: submit / cancel / status / statistics / history の入口
//! - **WorkerLoop**: pop → claim → handle → settle
//! - **SchedulerLoop**: 実行可能な永続タスクの再投入
//! - **MonitorLoop**: stuck 検出・orphan 回収・保持期間パージ

pub mod builder;
mod engine;
pub mod monitor_loop;
pub mod processor;
pub mod running;
mod scheduler_loop;
pub mod stats;
mod worker_loop;
pub mod worker_pool;

pub use self::builder::{BuildError, ProcessorBuilder};
pub use self::monitor_loop::MonitorReport;
pub use self::processor::Processor;
pub use self::stats::{Statistics, TypeCounters};
