use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use miner_backend::BackendAdapter;
use miner_core::config::{READINESS_LOG_EVERY_N_POLLS, READINESS_POLL_INTERVAL_SECS};

/// Monotonic readiness flag: polls the backend on the configured cadence
/// until it reports healthy, then stays `true` forever (§4.5).
pub struct ReadinessGate {
    ready: Arc<AtomicBool>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Sets the gate directly, skipping the poll cadence. For harnesses that
    /// exercise the router without waiting out a real poll interval.
    pub fn ready_for_test(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Polls `adapter.health_check()` every `READINESS_POLL_INTERVAL_SECS`
    /// until it returns `true`, then sets the gate and exits. Cancellable
    /// via `shutdown` while still polling.
    pub async fn run(&self, adapter: Arc<dyn BackendAdapter>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(READINESS_POLL_INTERVAL_SECS));
        let mut poll_count: u64 = 0;

        info!(backend = %adapter.name(), "readiness poller started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    poll_count += 1;
                    if adapter.health_check().await {
                        self.ready.store(true, Ordering::SeqCst);
                        info!(backend = %adapter.name(), polls = poll_count, "backend became ready");
                        return;
                    }
                    if poll_count % READINESS_LOG_EVERY_N_POLLS == 0 {
                        info!(backend = %adapter.name(), polls = poll_count, "still waiting for backend");
                    } else {
                        debug!(backend = %adapter.name(), polls = poll_count, "backend not yet ready");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("readiness poller shutting down before backend became ready");
                        return;
                    }
                }
            }
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use miner_backend::{BackendError, ChatCompletionRequest, InferenceResult};
    use std::sync::atomic::AtomicUsize;

    struct FlakyAdapter {
        healthy_after: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BackendAdapter for FlakyAdapter {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn chat_completion(
            &self,
            _req: ChatCompletionRequest,
        ) -> Result<InferenceResult, BackendError> {
            unimplemented!()
        }
        async fn health_check(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.healthy_after
        }
    }

    #[test]
    fn starts_not_ready() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn becomes_ready_after_backend_recovers() {
        let gate = Arc::new(ReadinessGate::new());
        let adapter: Arc<dyn BackendAdapter> = Arc::new(FlakyAdapter {
            healthy_after: 3,
            calls: AtomicUsize::new(0),
        });
        let (_tx, rx) = watch::channel(false);

        let gate_clone = gate.clone();
        let handle = tokio::spawn(async move { gate_clone.run(adapter, rx).await });

        tokio::time::advance(Duration::from_secs(READINESS_POLL_INTERVAL_SECS * 4)).await;
        handle.await.unwrap();

        assert!(gate.is_ready());
    }
}
