//! All three supported backends (llama.cpp, vLLM, Ollama) speak the same
//! OpenAI-compatible chat-completion HTTP protocol (§4.1). One typed client
//! suffices; only the base URL, bearer token and display name vary.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, warn};

use crate::adapter::BackendAdapter;
use crate::types::{BackendError, ChatCompletionRequest, InferenceResult, TokenUsage, ToolCall};

pub struct OpenAiCompatAdapter {
    client: reqwest::Client,
    name: String,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatAdapter {
    pub fn new(name: impl Into<String>, base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl BackendAdapter for OpenAiCompatAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<InferenceResult, BackendError> {
        let body = build_request_body(&req);
        let url = format!("{}/v1/chat/completions", self.base_url);
        let started = Instant::now();

        debug!(backend = %self.name, model = %req.model, "dispatching chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(backend = %self.name, status = status.as_u16(), body = %text, "backend API error");
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(parse_response(api_resp, elapsed_ms))
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(backend = %self.name, error = %e, "health check failed");
                false
            }
        }
    }
}

fn build_request_body(req: &ChatCompletionRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
        .collect();

    let mut body = serde_json::json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
        "top_p": req.top_p,
        "stream": false,
    });

    if !req.tools.is_empty() {
        let tools: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect();
        body["tools"] = serde_json::json!(tools);
        if let Some(choice) = &req.tool_choice {
            body["tool_choice"] = choice.clone();
        }
    }

    body
}

fn parse_response(resp: ApiResponse, elapsed_ms: u64) -> InferenceResult {
    let choice = resp.choices.into_iter().next();

    let content = choice
        .as_ref()
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or("")
        .to_string();

    let tool_calls: Vec<ToolCall> = choice
        .as_ref()
        .and_then(|c| c.message.tool_calls.as_ref())
        .map(|calls| {
            calls
                .iter()
                .map(|tc| {
                    let input: serde_json::Value =
                        serde_json::from_str(&tc.function.arguments).unwrap_or_default();
                    ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        input,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let raw_reason = choice
        .as_ref()
        .and_then(|c| c.finish_reason.clone())
        .unwrap_or_else(|| "stop".to_string());

    // A server that reports "stop" while also returning tool calls really
    // means "the model stopped to call a tool" — normalize it (§4.1).
    let finish_reason = if !tool_calls.is_empty() && raw_reason == "stop" {
        "tool_calls".to_string()
    } else {
        raw_reason
    };

    let usage = resp
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    InferenceResult {
        response_text: content,
        response_time_ms: elapsed_ms,
        tool_calls,
        finish_reason,
        usage,
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResp,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}
