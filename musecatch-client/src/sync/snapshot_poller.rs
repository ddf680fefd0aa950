//! Periodic `GET /queue/current` fetcher
//!
//! Polling is best-effort: a failed tick is logged and skipped, and the next
//! tick fetches again. The first fetch happens one interval after `start`;
//! callers that need an immediate answer (reload recovery) fetch once
//! themselves before starting the poller.

use crate::api::QueueBackend;
use musecatch_common::api::CurrentDownloadSnapshot;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type SnapshotSink = Box<dyn FnMut(CurrentDownloadSnapshot) + Send>;
type Gate = Arc<Mutex<Option<SnapshotSink>>>;

fn lock(gate: &Gate) -> MutexGuard<'_, Option<SnapshotSink>> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running poller; dropping it stops polling
pub struct SnapshotPoller {
    gate: Gate,
    cancel: CancellationToken,
}

impl SnapshotPoller {
    /// Start polling every `interval`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F>(backend: Arc<dyn QueueBackend>, interval: Duration, on_snapshot: F) -> Self
    where
        F: FnMut(CurrentDownloadSnapshot) + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let gate: Gate = Arc::new(Mutex::new(Some(Box::new(on_snapshot))));
        let cancel = CancellationToken::new();

        debug!(interval_ms = interval.as_millis() as u64, "Starting snapshot poller");
        tokio::spawn(poll_loop(
            backend,
            interval,
            Arc::clone(&gate),
            cancel.clone(),
        ));

        Self { gate, cancel }
    }

    /// Stop polling; safe to call any number of times
    pub fn stop(&self) {
        self.cancel.cancel();
        if lock(&self.gate).take().is_some() {
            debug!("Snapshot poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.gate).is_some()
    }
}

impl Drop for SnapshotPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    backend: Arc<dyn QueueBackend>,
    period: Duration,
    gate: Gate,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            fetched = backend.current_download() => fetched,
        };

        match fetched {
            Ok(snapshot) => {
                let mut guard = lock(&gate);
                match guard.as_mut() {
                    Some(sink) => sink(snapshot),
                    None => return,
                }
            }
            Err(e) => debug!(error = %e, "Snapshot poll failed, skipping tick"),
        }
    }
}
