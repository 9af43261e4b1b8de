//! Academy API gateway.
//!
//! ```text
//!   client ──▶ request id ─▶ trace ─▶ timeout ─▶ limit ─▶ metrics
//!                                                          │
//!                      handler ◀─ idempotency ◀─ auth ◀─ raw body
//!                         │            │
//!                       ledger     memory store ◀── sweeper
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

use academy_gateway::config::loader::{finalize, load_config};
use academy_gateway::idempotency::spawn_sweeper;
use academy_gateway::lifecycle::signals::spawn_signal_handler;
use academy_gateway::observability::{logging, metrics};
use academy_gateway::{GatewayConfig, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "academy-gateway")]
#[command(about = "Idempotent request pipeline for the academy API", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => finalize(GatewayConfig::default())?,
    };

    if cli.check {
        println!("configuration ok");
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "academy-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        idempotency_enabled = config.idempotency.enabled,
        retention_secs = config.idempotency.retention_secs,
        webhook_secret_set = !config.webhooks.secret.is_empty(),
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
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let sweep_interval = Duration::from_secs(config.idempotency.sweep_interval_secs);
    let server = HttpServer::new(config)?;
    let sweeper = spawn_sweeper(server.store(), sweep_interval, shutdown.subscribe());

    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Sweeper task ended abnormally");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
