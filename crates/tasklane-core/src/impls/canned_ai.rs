//! CannedAiBackend - 開発用の AiBackend
//!
//! 実プロバイダを呼ばずに決まった応答を返す。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::HandlerError;
use crate::ports::AiBackend;

#[derive(Debug, Clone, Default)]
pub struct CannedAiBackend {
    responses: HashMap<String, String>,
}

impl CannedAiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `prompt` with `response` verbatim.
    pub fn with_response(mut self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.insert(prompt.into(), response.into());
        self
    }
}

#[async_trait]
impl AiBackend for CannedAiBackend {
    async fn generate(
        &self,
        prompt: &str,
        _context: &serde_json::Value,
    ) -> Result<String, HandlerError> {
        if prompt.trim().is_empty() {
            return Err(HandlerError::InvalidParameters("empty prompt".to_string()));
        }
        Ok(self
            .responses
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| format!("Generated response for: {prompt}")))
    }
}
