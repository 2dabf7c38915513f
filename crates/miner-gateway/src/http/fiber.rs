use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use miner_admission::PipelineTiming;
use miner_backend::{ChatCompletionRequest, ChatMessage as BackendMessage, ToolDefinition};
use miner_core::MinerError;
use miner_mlts::{elide, HandshakeRequest};

use super::error::to_response;
use crate::app::NodeState;

const HEADER_VALIDATOR_HOTKEY: &str = "x-fiber-validator-hotkey-ss58";
const HEADER_SYMMETRIC_KEY_UUID: &str = "x-fiber-symmetric-key-uuid";

/// GET /fiber/public-key (§6).
pub async fn public_key_handler(State(state): State<Arc<NodeState>>) -> Json<Value> {
    Json(json!({ "public_key": state.mlts.public_key_pem() }))
}

#[derive(Deserialize)]
pub struct KeyExchangeRequest {
    pub encrypted_symmetric_key: String,
    pub symmetric_key_uuid: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
    pub validator_hotkey_ss58: String,
}

/// POST /fiber/key-exchange (§4.3, §6).
pub async fn key_exchange_handler(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<KeyExchangeRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .mlts
        .exchange_symmetric_key(HandshakeRequest {
            encrypted_symmetric_key_hex: &req.encrypted_symmetric_key,
            symmetric_key_uuid: &req.symmetric_key_uuid,
            timestamp: req.timestamp,
            nonce: &req.nonce,
            signature: &req.signature,
            peer_hotkey: &req.validator_hotkey_ss58,
        })
        .map_err(|e| {
            warn!(peer = %elide(&req.validator_hotkey_ss58), error = %e, "key exchange failed");
            let (status, body) = to_response(&e);
            (status, body)
        })?;

    info!(peer = %elide(&req.validator_hotkey_ss58), "symmetric key exchanged");
    Ok(Json(json!({ "success": true, "message": "Symmetric key exchanged successfully" })))
}

#[derive(Deserialize)]
struct ChallengeEnvelope {
    prompt: Option<String>,
    #[serde(default)]
    messages: Option<Vec<BackendMessage>>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_top_p")]
    top_p: f32,
    #[serde(default)]
    tools: Vec<ToolDefinition>,
    #[serde(default)]
    tool_choice: Option<Value>,
    #[serde(default)]
    metadata: Option<Value>,
}

fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.95
}

#[derive(Serialize)]
struct ChallengeResponse {
    response_text: String,
    response_time_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<miner_backend::ToolCall>,
    finish_reason: String,
    usage: miner_backend::TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

/// POST /fiber/challenge (§4.4, §4.6, §6) — decrypt, admit, dispatch,
/// encrypt, respond.
pub async fn challenge_handler(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let peer = match header_str(&headers, HEADER_VALIDATOR_HOTKEY) {
        Some(p) => p.to_string(),
        None => return bad_request("missing x-fiber-validator-hotkey-ss58 header"),
    };
    let uuid = match header_str(&headers, HEADER_SYMMETRIC_KEY_UUID) {
        Some(u) => u.to_string(),
        None => return bad_request("missing x-fiber-symmetric-key-uuid header"),
    };

    if !state.readiness.is_ready() {
        let (status, json) = to_response(&MinerError::NotReady);
        return (status, json).into_response();
    }

    let ciphertext = match std::str::from_utf8(&body) {
        Ok(s) => s.to_string(),
        Err(_) => return bad_request("challenge body must be valid utf-8 (a fernet token)"),
    };

    let plaintext = match state.mlts.decrypt_payload(&peer, &uuid, &ciphertext) {
        Ok(p) => p,
        Err(e) => {
            warn!(peer = %elide(&peer), uuid = %uuid, error = %e, "failed to decrypt challenge payload");
            let (status, json) = to_response(&e);
            return (status, json).into_response();
        }
    };

    let mut envelope: ChallengeEnvelope = match serde_json::from_slice(&plaintext) {
        Ok(env) => env,
        Err(e) => return bad_request(&format!("malformed challenge envelope: {e}")),
    };

    // metadata (including timing_data) is popped before the envelope is
    // handed to the adapter — the adapter schema rejects unknown fields (§4.6).
    let mut timing: Option<PipelineTiming> = envelope
        .metadata
        .take()
        .and_then(|m| m.get("timing_data").cloned())
        .and_then(|v| serde_json::from_value::<PipelineTiming>(v).ok());

    let messages = match resolve_messages(&envelope) {
        Ok(m) => m,
        Err(msg) => return bad_request(&msg),
    };

    let state_for_job = state.clone();
    let default_model = state.config.default_model.clone();
    let max_tokens = envelope.max_tokens;
    let temperature = envelope.temperature;
    let top_p = envelope.top_p;
    let tools = envelope.tools;
    let tool_choice = envelope.tool_choice;

    let inference_stage = timing.as_mut().map(|t| t.start_stage("miner_inference", now_ns()));

    let receiver = state.admission.submit(move || async move {
        state_for_job
            .backend
            .chat_completion(ChatCompletionRequest {
                model: default_model,
                messages,
                max_tokens,
                temperature,
                top_p,
                tools,
                tool_choice,
            })
            .await
    });

    let result = match receiver.await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            let (status, json) = to_response(&MinerError::BackendError(e.to_string()));
            return (status, json).into_response();
        }
        Err(_) => {
            let (status, json) = to_response(&MinerError::Internal("admission worker dropped".into()));
            return (status, json).into_response();
        }
    };

    if let (Some(t), Some(idx)) = (timing.as_mut(), inference_stage) {
        t.finish_stage(idx, now_ns());
    }
    let response_stage = timing.as_mut().map(|t| t.start_stage("miner_response", now_ns()));
    if let (Some(t), Some(idx)) = (timing.as_mut(), response_stage) {
        t.finish_stage(idx, now_ns());
    }
    let response_metadata = timing.map(|t| serde_json::json!({ "timing_data": t }));

    let payload = ChallengeResponse {
        response_text: result.response_text,
        response_time_ms: result.response_time_ms,
        tool_calls: result.tool_calls,
        finish_reason: result.finish_reason,
        usage: result.usage,
        metadata: response_metadata,
    };

    let body_json = match serde_json::to_vec(&payload) {
        Ok(b) => b,
        Err(e) => {
            let (status, json) = to_response(&MinerError::Serialization(e));
            return (status, json).into_response();
        }
    };

    let encrypted = match state.mlts.encrypt_payload(&peer, &uuid, &body_json) {
        Ok(token) => token,
        Err(e) => {
            let (status, json) = to_response(&e);
            return (status, json).into_response();
        }
    };

    let mut response = (StatusCode::OK, encrypted.into_bytes()).into_response();
    response
        .headers_mut()
        .insert("content-type", HeaderValue::from_static("application/octet-stream"));
    if let Ok(v) = HeaderValue::from_str(&uuid) {
        response.headers_mut().insert(HEADER_SYMMETRIC_KEY_UUID, v);
    }
    if let Ok(v) = HeaderValue::from_str(&state.node_address) {
        response.headers_mut().insert("x-fiber-miner-address", v);
    }
    response
}

fn resolve_messages(envelope: &ChallengeEnvelope) -> Result<Vec<BackendMessage>, String> {
    if let Some(messages) = &envelope.messages {
        if !messages.is_empty() {
            return Ok(messages.clone());
        }
    }
    if let Some(prompt) = &envelope.prompt {
        return Ok(vec![BackendMessage {
            role: "user".to_string(),
            content: prompt.clone(),
        }]);
    }
    Err("envelope must contain either `messages` or `prompt`".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "success": false, "error": message }))).into_response()
}

fn now_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
