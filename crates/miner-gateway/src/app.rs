use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::watch;

use miner_admission::{AdmissionPipeline, ReadinessGate};
use miner_backend::BackendAdapter;
use miner_core::config::MinerConfig;
use miner_mlts::MltsService;

/// Central shared state — passed as `Arc<NodeState>` to every axum handler
/// (§4.8, §9 "global-ish state" note).
pub struct NodeState {
    pub config: MinerConfig,
    pub mlts: MltsService,
    pub backend: Arc<dyn BackendAdapter>,
    pub admission: AdmissionPipeline,
    pub readiness: ReadinessGate,
    /// Stable address of this node, as reported in challenge response
    /// headers. Derived from `wallet_name`/`hotkey_name`; the keystore
    /// lookup itself is an external collaborator (§1).
    pub node_address: String,
}

impl NodeState {
    pub fn new(config: MinerConfig, mlts: MltsService, backend: Arc<dyn BackendAdapter>) -> Self {
        let max_concurrent = config.max_concurrent_requests;
        let node_address = config
            .hotkey_name
            .clone()
            .unwrap_or_else(|| "unregistered-node".to_string());
        Self {
            config,
            mlts,
            backend,
            admission: AdmissionPipeline::new(max_concurrent),
            readiness: ReadinessGate::new(),
            node_address,
        }
    }
}

/// Assemble the full axum router.
pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/availability", get(crate::http::availability::availability_handler))
        .route("/fiber/public-key", get(crate::http::fiber::public_key_handler))
        .route("/fiber/key-exchange", post(crate::http::fiber::key_exchange_handler))
        .route("/fiber/challenge", post(crate::http::fiber::challenge_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Spawns the readiness poller, session reaper, and admission pump as
/// background tasks, returning the shutdown sender that stops all three
/// (§4.8 step 6/8).
pub fn spawn_background_tasks(state: Arc<NodeState>) -> watch::Sender<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    {
        let state = state.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            state.readiness.run(state.backend.clone(), shutdown_rx).await;
        });
    }

    {
        let state = state.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            state.mlts.run_reaper(shutdown_rx).await;
        });
    }

    {
        let state = state.clone();
        tokio::spawn(async move {
            state.admission.run_pump(shutdown_rx).await;
        });
    }

    shutdown_tx
}
