use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use miner_backend::{registry, TestModeAdapter};
use miner_core::config::MinerConfig;
use miner_mlts::MltsService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // config path: explicit MINER_CONFIG env > ./miner.toml
    let config_path = std::env::var("MINER_CONFIG").ok();
    let config = MinerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        MinerConfig::default()
    });

    let _log_guard = miner_core::logging::init(&config.log_level, config.log_file.as_deref());

    let backend: Arc<dyn miner_backend::BackendAdapter> = if config.test_mode {
        info!("test_mode enabled, using canned backend responses");
        Arc::new(TestModeAdapter)
    } else {
        registry::resolve(&config.llm_backend, &config)?
    };

    let mlts = MltsService::new(config.fiber_key_ttl_seconds, config.fiber_handshake_timeout_seconds)?;

    let host = config.api_host.clone();
    let port = config.api_port;

    let state = Arc::new(miner_gateway::NodeState::new(config, mlts, backend));
    let shutdown_tx = miner_gateway::spawn_background_tasks(state.clone());
    let router = miner_gateway::build_router(state.clone());

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("miner gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    info!("draining in-flight admission workers");
    state.admission.drain().await;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
