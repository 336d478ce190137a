//! Ports - 抽象化レイヤー
//!
//! 外部システム（ドキュメントストア、AI プロバイダ、時計、ID 生成）への
//! インターフェースを trait として定義し、実装の詳細を隠蔽します。

pub mod ai_backend;
pub mod clock;
pub mod id_generator;
pub mod task_store;

pub use self::ai_backend::AiBackend;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
