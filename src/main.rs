//! Launch telemetry service binary
//!
//! Builds the services, serves the HTTP API and runs the snapshot task
//! until Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use launch_telemetry::api::{create_app, ApiState};
use launch_telemetry::config::ServiceConfig;
use launch_telemetry::pipeline::{snapshots, LaunchServices, ServicePhase};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "launch-telemetry")]
#[command(about = "Launch telemetry ingestion and readiness service")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long, env = "LAUNCH_TELEMETRY_ADDR", value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Load configuration from this TOML file instead of the default search
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(args: &CliArgs) -> Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServiceConfig::load(),
    };
    if let Some(addr) = &args.addr {
        config.server.addr.clone_from(addr);
    }
    config.validate().context("Invalid service configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let server_addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server.addr))?;

    info!(
        buffer_capacity = config.ingestion.buffer_capacity,
        max_sequence_gap = config.ingestion.max_sequence_gap,
        max_retries = config.ingestion.max_retries,
        "Starting launch telemetry service"
    );

    let services = Arc::new(LaunchServices::new(&config));
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("Failed to bind to {server_addr}"))?;
    info!("HTTP server listening on {}", server_addr);

    let app = create_app(ApiState::new(Arc::clone(&services), cancel_token.clone()));

    let mut tasks = JoinSet::new();
    tasks.spawn(snapshots::run_snapshot_loop(
        Arc::clone(&services),
        Duration::from_secs(config.aggregator.snapshot_interval_secs),
        cancel_token.clone(),
    ));

    services.transition(ServicePhase::Running, "listener bound");

    let server_token = cancel_token.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await;

    services.transition(ServicePhase::ShuttingDown, "server stopped");
    // Server errors also stop the background tasks
    cancel_token.cancel();

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Background task failed: {}", e);
        }
    }

    served.context("HTTP server error")?;

    let stats = services.receiver.stats();
    info!(
        packets = stats.packet_count,
        errors = stats.error_count,
        "Launch telemetry service shutdown complete"
    );
    Ok(())
}
