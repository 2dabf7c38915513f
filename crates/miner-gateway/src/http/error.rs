use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use miner_core::MinerError;

/// Translates a core error into an HTTP status and JSON body. This is the
/// ONLY place that mapping happens — C1-C5 never see a status code (§9).
pub fn to_response(err: &MinerError) -> (StatusCode, Json<Value>) {
    let status = match err {
        MinerError::HandshakeRejected(_) => StatusCode::BAD_REQUEST,
        MinerError::SessionUnknown { .. } => StatusCode::BAD_REQUEST,
        MinerError::SessionExpired { .. } => StatusCode::BAD_REQUEST,
        MinerError::DecryptFailed(_) => StatusCode::BAD_REQUEST,
        MinerError::BadEnvelope(_) => StatusCode::BAD_REQUEST,
        MinerError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        MinerError::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        MinerError::NoBackendAvailable => StatusCode::INTERNAL_SERVER_ERROR,
        MinerError::Config(_) | MinerError::Serialization(_) | MinerError::Io(_) | MinerError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(json!({ "success": false, "error": err.to_string(), "code": err.code() })),
    )
}
