//! Domain identifiers (strongly-typed IDs).
//!
//! ULID (Universally Unique Lexicographically Sortable Identifier) ベースの ID。
//! Phantom type パターンで `TaskId` と `LogId` を型レベルで区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 生成順序でソートできる
//! - **分散生成可能**: 調整なしで複数プロセスで生成できる
//! - **UUID互換**: 128-bit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display / FromStr で使うプレフィックス（"task-", "log-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when a string is not a valid prefixed ULID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id '{0}'")]
pub struct ParseIdError(pub String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    /// Accepts both the prefixed form (`task-01H...`) and a bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Execution log entry のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Log {}

impl IdMarker for Log {
    fn prefix() -> &'static str {
        "log-"
    }
}

/// Identifier of a task (submit/status/cancel unit).
pub type TaskId = Id<Task>;

/// Identifier of one execution log entry.
pub type LogId = Id<Log>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        let task = TaskId::from_ulid(Ulid::new());
        let log = LogId::from_ulid(Ulid::new());

        assert!(task.to_string().starts_with("task-"));
        assert!(log.to_string().starts_with("log-"));

        // let _: TaskId = log; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = TaskId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TaskId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn parse_accepts_prefixed_and_bare_forms() {
        let id = TaskId::from_ulid(Ulid::new());

        let prefixed: TaskId = id.to_string().parse().unwrap();
        let bare: TaskId = id.as_ulid().to_string().parse().unwrap();

        assert_eq!(prefixed, id);
        assert_eq!(bare, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "task-not-a-ulid".parse::<TaskId>().unwrap_err();
        assert_eq!(err, ParseIdError("task-not-a-ulid".to_string()));
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let id = TaskId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<Ulid>());
        assert_eq!(size_of::<LogId>(), 16);
    }
}
