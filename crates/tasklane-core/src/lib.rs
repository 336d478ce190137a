//! tasklane-core
//!
//! Core building blocks for the Tasklane background task processor.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, priority, state, task, history, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, IdGenerator, AiBackend）
//! - **queue**: 優先度レーンと再試行ポリシー
//! - **typed**: 型付き Task API（TaskParams, Handler, HandlerRegistry, TaskContext）
//! - **handlers**: 組み込みハンドラ（ai_processing, web_scraping など）
//! - **app**: アプリケーションロジック（builder, processor, worker / scheduler / monitor loop）
//! - **impls**: 実装（InMemoryTaskStore, JsonFileTaskStore, CannedAiBackend）
//! - **config**: 実行時パラメータ

pub mod app;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod typed;

pub use app::{Processor, ProcessorBuilder};
pub use config::ProcessorConfig;
