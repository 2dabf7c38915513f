use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex, Notify, Semaphore};
use tracing::{debug, info};

type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Bounded-concurrency admission pipeline with FIFO overflow queueing (§4.4).
///
/// Jobs are always handed to a single pump task over an unbounded channel;
/// the pump acquires a permit before spawning each one. When a permit is
/// immediately available this is indistinguishable from admitting the job
/// directly — the channel just adds one cheap hop — and it guarantees FIFO
/// ordering under overload without a second, separately-raced fast path.
pub struct AdmissionPipeline {
    semaphore: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<BoxedJob>,
    rx: AsyncMutex<Option<mpsc::UnboundedReceiver<BoxedJob>>>,
    active_count: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl AdmissionPipeline {
    pub fn new(max_concurrent_requests: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests)),
            tx,
            rx: AsyncMutex::new(Some(rx)),
            active_count: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Submit work to be run under the concurrency bound. Returns a receiver
    /// that resolves with the job's output once it runs.
    pub fn submit<F, Fut, T>(&self, job: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let boxed: BoxedJob = Box::pin(async move {
            let output = job().await;
            let _ = result_tx.send(output);
        });
        // An error here means the pump has shut down; the caller observes
        // this as a dropped oneshot receiver.
        let _ = self.tx.send(boxed);
        result_rx
    }

    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Waits until no jobs are in flight. Used during shutdown drain (§4.4).
    ///
    /// The `Notified` future is created before the count check so a
    /// `notify_waiters()` fired between the check and the await is not
    /// missed — `Notify` stores no permit, so registering interest first is
    /// required to avoid a lost wakeup.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Runs the FIFO pump until `shutdown` fires. May only be called once —
    /// it takes ownership of the internal receiver.
    pub async fn run_pump(&self, mut shutdown: watch::Receiver<bool>) {
        let mut rx = self
            .rx
            .lock()
            .await
            .take()
            .expect("run_pump called more than once");

        info!("admission pump started");
        loop {
            let job = tokio::select! {
                job = rx.recv() => job,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("admission pump shutting down");
                        return;
                    }
                    continue;
                }
            };

            let Some(job) = job else {
                debug!("admission channel closed, pump exiting");
                return;
            };

            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let active_count = self.active_count.clone();
            let idle = self.idle.clone();
            active_count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                job.await;
                drop(permit);
                active_count.fetch_sub(1, Ordering::SeqCst);
                idle.notify_waiters();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[tokio::test]
    async fn respects_concurrency_bound_and_fifo_order() {
        let pipeline = Arc::new(AdmissionPipeline::new(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pump_pipeline = pipeline.clone();
        let pump = tokio::spawn(async move { pump_pipeline.run_pump(shutdown_rx).await });

        let order = Arc::new(StdMutex::new(Vec::new()));
        let max_inflight = Arc::new(AtomicUsize::new(0));
        let current_inflight = Arc::new(AtomicUsize::new(0));

        let mut receivers = Vec::new();
        for i in 0..5u32 {
            let order = order.clone();
            let max_inflight = max_inflight.clone();
            let current_inflight = current_inflight.clone();
            let rx = pipeline.submit(move || async move {
                let now = current_inflight.fetch_add(1, Ordering::SeqCst) + 1;
                max_inflight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                order.lock().unwrap().push(i);
                current_inflight.fetch_sub(1, Ordering::SeqCst);
                i
            });
            receivers.push(rx);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let mut results = Vec::new();
        for rx in receivers {
            results.push(rx.await.unwrap());
        }

        assert_eq!(results, vec![0, 1, 2, 3, 4]);
        assert_eq!(max_inflight.load(Ordering::SeqCst), 1);

        let _ = shutdown_tx.send(true);
        let _ = pump.await;
    }
}
