use async_trait::async_trait;

use crate::types::{BackendError, ChatCompletionRequest, InferenceResult};

/// Uniform interface over a remote chat-completion HTTP server (§4.1).
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Adapter name for logging ("vllm" | "ollama" | "llamacpp").
    fn name(&self) -> &str;

    async fn chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<InferenceResult, BackendError>;

    /// Lists models on the upstream server; any 2xx response means healthy.
    /// Must be idempotent and side-effect free.
    async fn health_check(&self) -> bool;
}
