//! Contact gateway.
//!
//! Request-time defenses in front of a public message-submission endpoint.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request ID → trace → timeout → security headers
//!                         │
//!                         ▼
//!                  global rate limit ──(429)──▶ Client
//!                         │
//!                         ▼
//!                  POST /api/contact
//!                     contact rate limit ──(429)
//!                     honeypot ──(silent 200)
//!                     sanitize + validate + threat scan ──(400)
//!                         │
//!                         ▼
//!                  Delivery: log-only | mail relay ──(500 on failure)
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use contact_gateway::config::loader::{apply_env_overrides, load_config};
use contact_gateway::config::validation::validate_config;
use contact_gateway::config::{ConfigError, GatewayConfig};
use contact_gateway::http::GatewayServer;
use contact_gateway::lifecycle::{wait_for_signal, Shutdown};
use contact_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "contact-gateway")]
#[command(about = "Rate-limited, validating gateway for a public contact form", long_about = None)]
struct Cli {
    /// Path to a TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "contact-gateway starting");

    apply_env_overrides(&mut config);
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.security.environment,
        request_timeout_secs = config.timeouts.request_secs,
        relay_configured = config.relay.access_key.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
