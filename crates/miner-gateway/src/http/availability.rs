use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::app::NodeState;
use miner_mlts::elide;

/// GET /availability — cheap liveness probe for validators deciding whether
/// to send a challenge (§4.5, §6). Returns `200` with `available: false`
/// while the backend is still warming up; only a genuinely unexpected
/// failure returns `503`.
pub async fn availability_handler(State(state): State<Arc<NodeState>>, headers: HeaderMap) -> Json<Value> {
    if let Some(hotkey) = headers
        .get("validator-hotkey")
        .or_else(|| headers.get("x-fiber-validator-hotkey-ss58"))
        .and_then(|v| v.to_str().ok())
    {
        debug!(peer = %elide(hotkey), "availability probe");
    }

    if state.readiness.is_ready() {
        Json(json!({ "available": true }))
    } else {
        Json(json!({ "available": false, "reason": "Miner initializing" }))
    }
}
