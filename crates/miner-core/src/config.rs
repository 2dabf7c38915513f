use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8091;
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Backend health is polled at this cadence until the first success (§4.5).
pub const READINESS_POLL_INTERVAL_SECS: u64 = 5;
/// Every 12th poll (~60s) logs a progress line instead of debug-only.
pub const READINESS_LOG_EVERY_N_POLLS: u64 = 12;

/// Top level config: `miner.toml` merged with `MINER_*` env var overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_host")]
    pub api_host: String,
    #[serde(default = "default_port")]
    pub api_port: u16,

    #[serde(default = "default_backend")]
    pub llm_backend: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default = "default_top_p")]
    pub default_top_p: f32,

    #[serde(default = "default_vllm_base")]
    pub vllm_api_base: String,
    #[serde(default = "default_ollama_base")]
    pub ollama_api_base: String,
    #[serde(default = "default_llamacpp_base")]
    pub llamacpp_api_base: String,

    #[serde(default = "default_api_key")]
    pub vllm_api_key: String,
    #[serde(default = "default_api_key")]
    pub ollama_api_key: String,
    #[serde(default = "default_api_key")]
    pub llamacpp_api_key: String,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_key_ttl")]
    pub fiber_key_ttl_seconds: u64,
    #[serde(default = "default_handshake_timeout")]
    pub fiber_handshake_timeout_seconds: u64,

    pub wallet_name: Option<String>,
    pub hotkey_name: Option<String>,

    #[serde(default)]
    pub test_mode: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            api_host: default_host(),
            api_port: default_port(),
            llm_backend: default_backend(),
            default_model: default_model(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            default_top_p: default_top_p(),
            vllm_api_base: default_vllm_base(),
            ollama_api_base: default_ollama_base(),
            llamacpp_api_base: default_llamacpp_base(),
            vllm_api_key: default_api_key(),
            ollama_api_key: default_api_key(),
            llamacpp_api_key: default_api_key(),
            max_concurrent_requests: default_max_concurrent(),
            fiber_key_ttl_seconds: default_key_ttl(),
            fiber_handshake_timeout_seconds: default_handshake_timeout(),
            wallet_name: None,
            hotkey_name: None,
            test_mode: false,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl MinerConfig {
    /// Resolve the base URL + bearer token configured for `backend` ("vllm" |
    /// "ollama" | "llamacpp"). Returns `None` for an unrecognized name.
    pub fn backend_endpoint(&self, backend: &str) -> Option<(&str, &str)> {
        match backend {
            "vllm" => Some((&self.vllm_api_base, &self.vllm_api_key)),
            "ollama" => Some((&self.ollama_api_base, &self.ollama_api_key)),
            "llamacpp" => Some((&self.llamacpp_api_base, &self.llamacpp_api_key)),
            _ => None,
        }
    }

    /// Load config from a TOML file with `MINER_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `./miner.toml`
    ///
    /// `MinerConfig` is flat (`api_host`, `max_concurrent_requests`, ...), so
    /// env keys map directly without `Env`'s nested-key splitting: `MINER_API_HOST`
    /// becomes `api_host`, not `api.host`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.map(String::from).unwrap_or_else(default_config_path);

        let config: MinerConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MINER_"))
            .extract()
            .map_err(|e| crate::error::MinerError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_backend() -> String {
    "vllm".to_string()
}
fn default_model() -> String {
    "default".to_string()
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
fn default_vllm_base() -> String {
    "http://localhost:8000".to_string()
}
fn default_ollama_base() -> String {
    "http://localhost:11434".to_string()
}
fn default_llamacpp_base() -> String {
    "http://localhost:8080".to_string()
}
fn default_api_key() -> String {
    "EMPTY".to_string()
}
fn default_max_concurrent() -> usize {
    4
}
fn default_key_ttl() -> u64 {
    300
}
fn default_handshake_timeout() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_config_path() -> String {
    "miner.toml".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_api_key_is_empty_literal() {
        assert_eq!(default_api_key(), "EMPTY");
    }

    #[test]
    fn backend_endpoint_resolves_known_names() {
        let cfg = MinerConfig::default();
        assert_eq!(
            cfg.backend_endpoint("vllm"),
            Some((cfg.vllm_api_base.as_str(), cfg.vllm_api_key.as_str()))
        );
        assert!(cfg.backend_endpoint("bogus").is_none());
    }

    #[test]
    fn env_overrides_flat_fields() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MINER_API_PORT", "9999");
            jail.set_env("MINER_TEST_MODE", "true");
            jail.set_env("MINER_MAX_CONCURRENT_REQUESTS", "64");

            let config = MinerConfig::load(Some("nonexistent.toml")).unwrap();
            assert_eq!(config.api_port, 9999);
            assert!(config.test_mode);
            assert_eq!(config.max_concurrent_requests, 64);
            Ok(())
        });
    }
}
