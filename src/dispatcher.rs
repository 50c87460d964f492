use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::node::PingPongNode;

/// Timing knobs of the background ping loop.
#[derive(Copy, Clone, Debug, Default)]
pub struct DispatchSettings {
    /// Period between two pings; zero keeps the dispatcher idle.
    pub interval: Duration,
    /// Pending pings older than this are dropped each cycle.
    pub pending_max_age: Option<Duration>,
}

impl DispatchSettings {
    pub fn from_millis(interval_ms: u64, pending_max_age_ms: u64) -> Self {
        DispatchSettings {
            interval: Duration::from_millis(interval_ms),
            pending_max_age: (pending_max_age_ms > 0)
                .then(|| Duration::from_millis(pending_max_age_ms)),
        }
    }
}

/// Background activity pinging the peer at a fixed interval.
///
/// Idle when the interval is zero, otherwise running until its token is cancelled.
pub struct PingDispatcher {
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl PingDispatcher {
    pub fn start(
        node: Arc<PingPongNode>,
        settings: DispatchSettings,
        cancel: CancellationToken,
    ) -> Self {
        if settings.interval.is_zero() {
            log::info!("Ping interval is 0, dispatcher stays idle");
            return PingDispatcher { task: None, cancel };
        }

        log::info!("Pinging every {} ms", settings.interval.as_millis());
        let task = tokio::spawn(run_dispatcher(node, settings, cancel.clone()));
        PingDispatcher {
            task: Some(task),
            cancel,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancels the loop and waits for the current cycle to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                log::error!("Ping dispatcher terminated abnormally: {}", e);
            }
        }
    }
}

async fn run_dispatcher(
    node: Arc<PingPongNode>,
    settings: DispatchSettings,
    cancel: CancellationToken,
) {
    loop {
        match node.trigger_ping().await {
            Ok(Some(tag)) => log::debug!("Sent ping {}", tag),
            Ok(None) => {}
            Err(e) => log::error!("Error in ping loop: {}", e),
        }

        if let Some(max_age) = settings.pending_max_age {
            let evicted = node.correlator().evict_older_than(max_age);
            if evicted > 0 {
                log::debug!("Evicted {} stale pending pings", evicted);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }
    log::debug!("Ping dispatcher stopped");
}
