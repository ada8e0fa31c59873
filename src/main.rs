//! Mutating admission webhook: the application entry point.
//!
//! Parses flags (each with an environment fallback), initializes tracing, builds the
//! router around the default mutator, and runs the HTTPS server until a shutdown
//! signal has been handled. Exits nonzero on any startup or transport failure.

use std::sync::Arc;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mutating_admission::config::{
    ClientAuthMode, Config, LogFormat, TlsPaths, DEFAULT_CA_PATH, DEFAULT_CERT_PATH,
    DEFAULT_KEY_PATH, DEFAULT_LISTEN_ADDR, DEFAULT_LOG_FILTER, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
use mutating_admission::http::start_server;
use mutating_admission::mutate::AllowAll;
use mutating_admission::routes::create_router;
use mutating_admission::state::WebhookState;

/// TLS front end for a Kubernetes mutating admission webhook
#[derive(Parser, Debug)]
#[command(name = "mutating-admission", version, about)]
struct Args {
    /// TLS server key
    #[arg(long, env = "KEY", default_value = DEFAULT_KEY_PATH)]
    key: String,

    /// TLS server certificate
    #[arg(long, env = "CRT", default_value = DEFAULT_CERT_PATH)]
    crt: String,

    /// Client root CA certificate
    #[arg(long, env = "CACRT", default_value = DEFAULT_CA_PATH)]
    cacrt: String,

    /// TLS listen address
    #[arg(long, env = "ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    addr: String,

    /// Verbose logging in the mutation delegate
    #[arg(long, env = "VERBOSE", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    verbose: bool,

    /// Client certificate policy
    #[arg(long, env = "CLIENT_AUTH", value_enum, default_value_t = ClientAuthMode::None)]
    client_auth: ClientAuthMode,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    shutdown_timeout: u64,

    /// Seconds allowed to receive request headers, and separately the request body
    #[arg(long, env = "READ_TIMEOUT", default_value_t = DEFAULT_READ_TIMEOUT_SECS)]
    read_timeout: u64,

    /// Log level filter (e.g., "mutating_admission=debug")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn into_config(self) -> Result<Config, mutating_admission::config::ConfigError> {
        Config::new(
            TlsPaths {
                cert: self.crt.into(),
                key: self.key.into(),
                ca_cert: self.cacrt.into(),
            },
            self.client_auth,
            &self.addr,
            self.verbose,
            self.shutdown_timeout,
            self.read_timeout,
        )
    }
}

fn init_tracing(filter: &str, format: LogFormat) {
    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, args.log_format);

    let config = args.into_config().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    tracing::info!(
        addr = %config.listen_addr,
        client_auth = ?config.client_auth,
        verbose = config.verbose,
        shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
        "Loaded configuration"
    );

    let state = WebhookState::new(Arc::new(AllowAll), config.verbose);
    let app = create_router(state, config.read_timeout);

    start_server(app, &config).await.inspect_err(|e| {
        tracing::error!(error = %e, "Server failed");
    })?;

    tracing::info!("Shutdown complete");
    Ok(())
}
