//! Handler trait - task を実行するハンドラの定義
//!
//! # 二層構造
//! - **表層（Typed）**: `Handler<T>` - パラメータは `T` にデコード済み
//! - **内部（Dyn）**: `TaskHandler` - object-safe、registry と worker はこちらだけを見る
//!
//! `TypedHandler<T, H>` が前者を後者に変換する（type erasure）。

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::context::TaskContext;
use super::task::TaskParams;
use crate::domain::HandlerError;

/// Typed handler for one [`TaskParams`] type.
#[async_trait]
pub trait Handler<T: TaskParams>: Send + Sync {
    async fn handle(&self, params: T, ctx: TaskContext) -> Result<Value, HandlerError>;

    /// Extra checks beyond decoding, run at submission.
    fn validate(&self, _params: &T) -> Result<(), String> {
        Ok(())
    }
}

/// Object-safe handler stored in the registry.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, parameters: Value, ctx: TaskContext) -> Result<Value, HandlerError>;

    /// Reject malformed parameters before anything is persisted.
    fn validate(&self, _parameters: &Value) -> Result<(), String> {
        Ok(())
    }
}

pub struct TypedHandler<T: TaskParams, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskParams, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }

    fn decode(parameters: Value) -> Result<T, String> {
        serde_json::from_value(parameters).map_err(|e| format!("json decode: {e}"))
    }
}

#[async_trait]
impl<T: TaskParams, H: Handler<T>> TaskHandler for TypedHandler<T, H> {
    async fn handle(&self, parameters: Value, ctx: TaskContext) -> Result<Value, HandlerError> {
        let params = Self::decode(parameters).map_err(HandlerError::InvalidParameters)?;
        self.handler.handle(params, ctx).await
    }

    fn validate(&self, parameters: &Value) -> Result<(), String> {
        let params = Self::decode(parameters.clone())?;
        self.handler.validate(&params)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::EchoHandler;
    use super::*;
    use crate::domain::{TaskId, TaskType};
    use crate::typed::task::fixtures::Echo;
    use serde_json::json;
    use ulid::Ulid;

    fn ctx() -> TaskContext {
        TaskContext::detached(TaskId::from_ulid(Ulid::new()), TaskType::new(Echo::TYPE))
    }

    #[tokio::test]
    async fn typed_handler_decodes_parameters() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        let out = handler.handle(json!({ "value": 100 }), ctx()).await.unwrap();
        assert_eq!(out, json!({ "value": 100 }));
    }

    #[tokio::test]
    async fn undecodable_parameters_fail_the_attempt() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        let err = handler.handle(json!({ "value": "x" }), ctx()).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidParameters(msg) if msg.starts_with("json decode")));
    }

    #[test]
    fn validate_decodes_then_runs_handler_checks() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        assert!(handler.validate(&json!({ "value": 1 })).is_ok());
        assert!(handler.validate(&json!({})).is_err());
        assert_eq!(
            handler.validate(&json!({ "value": -1 })).unwrap_err(),
            "value must be non-negative"
        );
    }
}
