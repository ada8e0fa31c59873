//! HTTPS server module.
//!
//! This module provides:
//! - TLS identity and client trust store loading
//! - The server lifecycle (bind, serve, drain)
//! - Graceful shutdown on SIGTERM/SIGINT with a bounded deadline

mod server;
mod shutdown;
mod tls;

pub use server::{start_server, ServerError, WebhookServer};
pub use shutdown::{ShutdownTrigger, SignalWatcher};
pub use tls::{build_server_config, Artifact, ConfigurationError};
