use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("Session unknown for peer {peer} uuid {uuid}")]
    SessionUnknown { peer: String, uuid: String },

    #[error("Session expired for peer {peer} uuid {uuid}")]
    SessionExpired { peer: String, uuid: String },

    #[error("Failed to decrypt payload: {0}")]
    DecryptFailed(String),

    #[error("Backend not ready")]
    NotReady,

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Malformed challenge envelope: {0}")]
    BadEnvelope(String),

    #[error("No backend available")]
    NoBackendAvailable,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MinerError {
    /// Short error code, used in log fields and as a stable identifier
    /// for handler-layer status mapping.
    pub fn code(&self) -> &'static str {
        match self {
            MinerError::Config(_) => "CONFIG_ERROR",
            MinerError::HandshakeRejected(_) => "HANDSHAKE_REJECTED",
            MinerError::SessionUnknown { .. } => "SESSION_UNKNOWN",
            MinerError::SessionExpired { .. } => "SESSION_EXPIRED",
            MinerError::DecryptFailed(_) => "DECRYPT_FAILED",
            MinerError::NotReady => "NOT_READY",
            MinerError::BackendError(_) => "BACKEND_ERROR",
            MinerError::BadEnvelope(_) => "BAD_ENVELOPE",
            MinerError::NoBackendAvailable => "NO_BACKEND_AVAILABLE",
            MinerError::Serialization(_) => "SERIALIZATION_ERROR",
            MinerError::Io(_) => "IO_ERROR",
            MinerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MinerError>;
