//! Configuration and constants.
//!
//! `Config` is built once in `main` from command-line flags (each with an environment
//! fallback) and handed to the components that need it. Nothing reads process-wide
//! mutable state after startup.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default path to the server private key
pub const DEFAULT_KEY_PATH: &str = "/pki/tls.key";

/// Default path to the server certificate
pub const DEFAULT_CERT_PATH: &str = "/pki/tls.crt";

/// Default path to the CA used to verify client certificates
pub const DEFAULT_CA_PATH: &str = "/pki/root/ca.crt";

/// Default listen address (all interfaces)
pub const DEFAULT_LISTEN_ADDR: &str = ":8443";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "mutating_admission=info";

// =============================================================================
// Timeouts and Limits
// =============================================================================

/// Time allowed for in-flight requests to finish once a shutdown signal arrives
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Time allowed to receive a request body
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;

/// Upper bound on an admission review body (16 MiB)
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// Response Bodies
// =============================================================================

/// Body returned by the health responder
pub const HEALTH_BODY: &str = "OK";

/// Body returned for every request failure; never carries internal detail
pub const SERVER_ERROR_BODY: &str = "server error";

/// Whether, and how strictly, clients must present a certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ClientAuthMode {
    /// Do not ask for a client certificate. The trust store is still loaded and validated.
    #[default]
    None,
    /// Ask for a certificate and verify it when presented; anonymous clients are allowed.
    Request,
    /// Mutual TLS: reject clients without a certificate issued by the trust store.
    Require,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Locations of the TLS artifacts on disk.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca_cert: PathBuf,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub tls: TlsPaths,
    pub client_auth: ClientAuthMode,
    pub listen_addr: SocketAddr,
    /// Passed through to the mutation delegate
    pub verbose: bool,
    pub shutdown_timeout: Duration,
    pub read_timeout: Duration,
}

impl Config {
    /// Build a configuration from raw flag values.
    ///
    /// The listen address is resolved here so that a bad address is a startup error
    /// rather than a bind error later on.
    pub fn new(
        tls: TlsPaths,
        client_auth: ClientAuthMode,
        addr: &str,
        verbose: bool,
        shutdown_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        if read_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "read timeout must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            tls,
            client_auth,
            listen_addr: parse_listen_addr(addr)?,
            verbose,
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
            read_timeout: Duration::from_secs(read_timeout_secs),
        })
    }
}

/// Parse a listen address.
///
/// Accepts `:port` (all IPv4 interfaces), `ip:port`, `[ipv6]:port` and `host:port`.
/// Host names are resolved once and the first address wins.
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAddress {
        addr: addr.to_string(),
        reason,
    };

    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|e| invalid(format!("{e}")))?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }

    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        return Ok(socket_addr);
    }

    addr.to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("address did not resolve".to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid listen address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },
    #[error("Configuration error: {0}")]
    Validation(String),
}
