//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻 + 乱数で ULID を生成

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::{LogId, TaskId};
use crate::ports::Clock;

/// IdGenerator は ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数ワーカーから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_log_id(&self) -> LogId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使うので、テスト時に FixedClock で timestamp 部分を固定できます。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_log_id(&self) -> LogId {
        LogId::from(self.next_ulid())
    }
}
