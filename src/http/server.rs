//! HTTPS server lifecycle.
//!
//! Startup is ordered so that nothing is half-running: TLS material is loaded first, then
//! the listener is bound, then signal handlers are armed, then connections are served.
//! A TLS failure therefore never leaves a port bound, and no request can be accepted
//! before a shutdown signal would be able to drain it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::TokioTimer;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;

use crate::config::{Config, DEFAULT_READ_TIMEOUT_SECS};

use super::shutdown::{ShutdownTrigger, SignalWatcher};
use super::tls::{build_server_config, ConfigurationError};

/// Server startup and runtime error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to load TLS configuration: {0}")]
    Tls(#[from] ConfigurationError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to install signal handlers: {0}")]
    Signal(std::io::Error),

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// A bound, not yet serving, HTTPS server.
pub struct WebhookServer {
    listener: std::net::TcpListener,
    tls: RustlsConfig,
    handle: Handle,
    shutdown: ShutdownTrigger,
    local_addr: SocketAddr,
    header_timeout: Duration,
}

impl WebhookServer {
    /// Load TLS material and bind the listen address from `config`.
    pub fn bind(config: &Config) -> Result<Self, ServerError> {
        let tls = build_server_config(&config.tls, config.client_auth)?;
        tracing::info!(
            cert = %config.tls.cert.display(),
            key = %config.tls.key.display(),
            ca = %config.tls.ca_cert.display(),
            client_auth = ?config.client_auth,
            "Loaded TLS configuration"
        );
        Ok(Self::bind_with(config.listen_addr, tls, config.shutdown_timeout)?
            .with_header_timeout(config.read_timeout))
    }

    /// Bind `addr` with an already built TLS configuration.
    pub fn bind_with(
        addr: SocketAddr,
        tls: Arc<rustls::ServerConfig>,
        shutdown_timeout: Duration,
    ) -> Result<Self, ServerError> {
        let bind_error = |source| ServerError::Bind { addr, source };

        let listener = std::net::TcpListener::bind(addr).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let handle = Handle::new();
        let shutdown = ShutdownTrigger::new(handle.clone(), shutdown_timeout);

        Ok(Self {
            listener,
            tls: RustlsConfig::from_config(tls),
            handle,
            shutdown,
            local_addr,
            header_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        })
    }

    /// Close HTTP/1 connections whose request headers take longer than `timeout` to arrive.
    pub fn with_header_timeout(mut self, timeout: Duration) -> Self {
        self.header_timeout = timeout;
        self
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A trigger for draining this server without an OS signal.
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    /// Serve until SIGINT/SIGTERM, then drain.
    ///
    /// Returns once the drain has finished or its deadline has passed.
    pub async fn run(self, app: Router) -> Result<(), ServerError> {
        let signals = SignalWatcher::install().map_err(ServerError::Signal)?;
        let watcher = tokio::spawn(signals.watch(self.shutdown.clone()));

        let result = self.serve(app).await;
        watcher.abort();
        result
    }

    /// Serve until the shutdown trigger fires and the drain completes.
    ///
    /// A graceful close is `Ok`; any other accept-loop failure is `ServerError::Serve`.
    pub async fn serve(self, app: Router) -> Result<(), ServerError> {
        let Self {
            listener,
            tls,
            handle,
            shutdown,
            local_addr,
            header_timeout,
        } = self;

        tracing::info!(addr = %local_addr, "Starting HTTPS server");

        let mut server = axum_server::from_tcp_rustls(listener, tls).handle(handle);
        // The body is bounded by the router; this bounds the request line and headers
        server
            .http_builder()
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(header_timeout);

        server
            .serve(app.into_make_service())
            .await
            .map_err(ServerError::Serve)?;

        match shutdown.drain_started() {
            Some(started) => {
                let elapsed = started.elapsed();
                if elapsed >= shutdown.timeout() {
                    tracing::warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Shutdown deadline reached, remaining connections were closed"
                    );
                } else {
                    tracing::info!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        "All connections drained"
                    );
                }
            }
            None => tracing::info!("Server stopped"),
        }

        Ok(())
    }
}

/// Bind, serve and drain on signal: the whole lifecycle for a given router.
pub async fn start_server(app: Router, config: &Config) -> Result<(), ServerError> {
    WebhookServer::bind(config)?.run(app).await
}
