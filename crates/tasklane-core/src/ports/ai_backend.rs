//! AiBackend port - AI プロバイダの抽象化
//!
//! テキスト生成・推論などの呼び出しは不透明な capability として扱う。
//! 一部のハンドラ（ai_processing など）だけが使う。

use async_trait::async_trait;

use crate::domain::HandlerError;

#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Generate text for `prompt`. `context` is handler-defined JSON.
    async fn generate(
        &self,
        prompt: &str,
        context: &serde_json::Value,
    ) -> Result<String, HandlerError>;
}
