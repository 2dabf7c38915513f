use async_trait::async_trait;

use crate::adapter::BackendAdapter;
use crate::types::{BackendError, ChatCompletionRequest, InferenceResult, TokenUsage};

/// Canned in-process adapter used when `test_mode = true` (§10.4). Lets a
/// deployment be smoke-tested end to end without a loaded model.
pub struct TestModeAdapter;

#[async_trait]
impl BackendAdapter for TestModeAdapter {
    fn name(&self) -> &str {
        "test-mode"
    }

    async fn chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<InferenceResult, BackendError> {
        let prompt_chars: usize = req.messages.iter().map(|m| m.content.len()).sum();
        let response_text = "This is a canned test-mode response.".to_string();

        // Rough estimate only — no tokenizer is available without a real backend.
        let prompt_tokens = (prompt_chars / 4).max(1) as u32;
        let completion_tokens = (response_text.len() / 4).max(1) as u32;

        Ok(InferenceResult {
            response_text,
            response_time_ms: 1,
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[tokio::test]
    async fn test_mode_returns_nonzero_usage() {
        let adapter = TestModeAdapter;
        let result = adapter
            .chat_completion(ChatCompletionRequest {
                model: "whatever".to_string(),
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: "hello there".to_string(),
                }],
                max_tokens: 8,
                temperature: 0.7,
                top_p: 0.95,
                tools: vec![],
                tool_choice: None,
            })
            .await
            .unwrap();
        assert!(!result.response_text.is_empty());
        assert!(result.usage.total_tokens > 0);
        assert!(adapter.health_check().await);
    }
}
