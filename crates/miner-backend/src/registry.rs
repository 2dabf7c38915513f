//! Maps a configured backend name to a constructed adapter, with fallback
//! to the first registered name on an unknown selection (§4.2).

use std::sync::Arc;
use tracing::warn;

use miner_core::config::MinerConfig;

use crate::adapter::BackendAdapter;
use crate::openai_compat::OpenAiCompatAdapter;

/// Names registered unconditionally at process start; the set is closed.
pub const KNOWN_BACKENDS: &[&str] = &["vllm", "ollama", "llamacpp"];

fn construct(name: &str, config: &MinerConfig) -> Option<Arc<dyn BackendAdapter>> {
    let (base_url, api_key) = config.backend_endpoint(name)?;
    Some(Arc::new(OpenAiCompatAdapter::new(
        name.to_string(),
        base_url.to_string(),
        api_key.to_string(),
    )))
}

/// Resolve `name` to an adapter. Falls back to the first known backend
/// (logging a warning) when `name` isn't recognized; fails only when the
/// registry itself is empty.
pub fn resolve(name: &str, config: &MinerConfig) -> miner_core::Result<Arc<dyn BackendAdapter>> {
    if KNOWN_BACKENDS.is_empty() {
        return Err(miner_core::MinerError::NoBackendAvailable);
    }

    if let Some(adapter) = construct(name, config) {
        return Ok(adapter);
    }

    let fallback = KNOWN_BACKENDS[0];
    warn!(requested = %name, fallback = %fallback, "unknown llm_backend, falling back");
    construct(fallback, config).ok_or(miner_core::MinerError::NoBackendAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_name() {
        let config = MinerConfig::default();
        let adapter = resolve("ollama", &config).unwrap();
        assert_eq!(adapter.name(), "ollama");
    }

    #[test]
    fn resolve_unknown_name_falls_back() {
        let config = MinerConfig::default();
        let adapter = resolve("nonexistent", &config).unwrap();
        assert_eq!(adapter.name(), KNOWN_BACKENDS[0]);
    }
}
