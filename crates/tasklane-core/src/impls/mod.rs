//! Impls - ports の実装（開発・単体運用向け）
//!
//! - `InMemoryTaskStore`: テスト用のドキュメントストア
//! - `JsonFileTaskStore`: JSON ファイルに永続化するドキュメントストア
//! - `CannedAiBackend`: 固定応答の AI バックエンド

pub mod canned_ai;
pub mod collection;
pub mod document;
pub mod file_store;
pub mod memory_store;

pub use self::canned_ai::CannedAiBackend;
pub use self::document::{LogDocument, TaskDocument};
pub use self::file_store::JsonFileTaskStore;
pub use self::memory_store::InMemoryTaskStore;
