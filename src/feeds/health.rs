use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::gateway::BacktestApi;
use crate::types::ConnectivityStatus;

/// One health probe. Any failure or a probe exceeding `timeout` is
/// `Unhealthy`; never returns an error.
pub async fn ping_health(api: &dyn BacktestApi, timeout: Duration) -> ConnectivityStatus {
    match tokio::time::timeout(timeout, api.health()).await {
        Ok(Ok(())) => ConnectivityStatus::Healthy,
        Ok(Err(e)) => {
            debug!(error = %e, "health check failed");
            ConnectivityStatus::Unhealthy
        }
        Err(_) => {
            debug!(timeout_ms = timeout.as_millis() as u64, "health check timed out");
            ConnectivityStatus::Unhealthy
        }
    }
}

/// Background task polling `GET /health` on a fixed period so that an idle
/// backend stays warm and the UI can show connectivity.
///
/// First probe fires immediately. Probes are independent: a failure only
/// flips the status. `stop()` waits for the task to end.
pub struct KeepAliveMonitor {
    status: watch::Receiver<ConnectivityStatus>,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl KeepAliveMonitor {
    pub fn start(api: Arc<dyn BacktestApi>, period: Duration, timeout: Duration) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectivityStatus::Checking);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_s = period.as_secs(), "keep-alive started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                let status = tokio::select! {
                    s = ping_health(api.as_ref(), timeout) => s,
                    _ = shutdown_rx.changed() => break,
                };
                let prev = status_tx.send_replace(status);
                if prev != status {
                    match status {
                        ConnectivityStatus::Unhealthy => warn!("backend unreachable"),
                        _ => info!(status = status.label(), "backend connectivity changed"),
                    }
                }
            }
            debug!("keep-alive stopped");
        });

        Self {
            status: status_rx,
            shutdown: shutdown_tx,
            handle: Some(handle),
        }
    }

    pub fn status(&self) -> ConnectivityStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status.clone()
    }

    /// Signal the task and wait for it to exit. No probe starts after this
    /// returns.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for KeepAliveMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
