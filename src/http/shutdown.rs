//! Graceful shutdown and signal handling.
//!
//! SIGTERM and SIGINT both start the same bounded drain. Only the first signal counts;
//! later ones are logged and ignored, so an impatient orchestrator sending a second
//! SIGTERM cannot cut the drain short or close the listener twice.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use axum_server::Handle;

/// One-shot trigger for a graceful shutdown with a fixed deadline.
///
/// Cheap to clone; every clone refers to the same drain.
#[derive(Clone)]
pub struct ShutdownTrigger {
    handle: Handle,
    timeout: Duration,
    started: Arc<OnceLock<Instant>>,
}

impl ShutdownTrigger {
    pub fn new(handle: Handle, timeout: Duration) -> Self {
        Self {
            handle,
            timeout,
            started: Arc::new(OnceLock::new()),
        }
    }

    /// Start draining. Returns `false` if a drain was already under way.
    ///
    /// The server stops accepting connections at once and gives in-flight requests
    /// until the deadline to finish; whatever is still open then is closed.
    pub fn trigger(&self) -> bool {
        if self.started.set(Instant::now()).is_err() {
            return false;
        }

        self.handle.graceful_shutdown(Some(self.timeout));
        tracing::info!(
            timeout_secs = self.timeout.as_secs(),
            "Graceful shutdown initiated, waiting for connections to close"
        );
        true
    }

    /// When draining began, if it has.
    pub fn drain_started(&self) -> Option<Instant> {
        self.started.get().copied()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Listens for SIGINT and SIGTERM (Ctrl+C on other platforms).
///
/// Handlers are registered by [`SignalWatcher::install`], so from that point on the
/// default disposition no longer kills the process.
pub struct SignalWatcher {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl SignalWatcher {
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal. `None` once signals can no longer be delivered.
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<&'static str> {
        tokio::select! {
            received = self.interrupt.recv() => received.map(|_| "SIGINT"),
            received = self.terminate.recv() => received.map(|_| "SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<&'static str> {
        tokio::signal::ctrl_c().await.ok().map(|_| "Ctrl+C")
    }

    /// Trigger `shutdown` on the first signal and swallow the rest.
    pub async fn watch(mut self, shutdown: ShutdownTrigger) {
        while let Some(signal) = self.recv().await {
            if shutdown.trigger() {
                tracing::info!(signal, "Received shutdown signal");
            } else {
                tracing::info!(signal, "Shutdown already in progress, ignoring signal");
            }
        }
        tracing::warn!("Signal stream closed");
    }
}
