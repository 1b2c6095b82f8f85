//! Channel router daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                 CHANNEL ROUTER                   │
//!                      │                                                  │
//!   Outbound caller    │  ┌───────────┐   ┌──────────┐   ┌─────────────┐  │
//!   ───────────────────┼─▶│ scheduler │──▶│  health  │   │  registry   │  │
//!   allocate/release   │  │  + queue  │   │ tracker  │   │ (TOML file) │  │
//!                      │  └─────┬─────┘   └────┬─────┘   └──────▲──────┘  │
//!                      │        │  quarantine  │                │         │
//!                      │        │◀─────────────┘                │         │
//!                      │        └───────── list_channels ───────┘         │
//!                      │                                                  │
//!   Management UI      │  ┌───────────┐   ┌──────────────┐                │
//!   ───────────────────┼─▶│   admin   │   │ observability│                │
//!                      │  │    API    │   │ logs+metrics │                │
//!                      │  └───────────┘   └──────────────┘                │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use channel_router::admin::{setup_admin_router, AdminState};
use channel_router::config::load_config;
use channel_router::observability::{logging, metrics};
use channel_router::{FileRegistry, HealthTracker, Scheduler};

#[derive(Parser)]
#[command(name = "channel-router")]
#[command(about = "Upstream channel scheduler with health tracking", long_about = None)]
struct Args {
    /// Path to the router configuration (TOML).
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("channel-router v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        config = %args.config.display(),
        scopes = config.scopes.len(),
        queue_timeout_secs = config.scheduler.queue_timeout_secs,
        failure_threshold = config.health.failure_threshold,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let registry = Arc::new(FileRegistry::new(&args.config));
    tracing::info!(path = %registry.path().display(), "Channel registry ready");
    let health = Arc::new(HealthTracker::new(config.health.clone()));
    let scheduler = Arc::new(Scheduler::new(registry, health, &config.scheduler));

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(AdminState::new(scheduler, &config.admin.api_key));
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        tracing::info!("Admin API disabled");
        shutdown_signal().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Shutdown signal received");
}
