//! Seat Lease Server
//!
//! Long-running process that owns the seat pool and reclaims expired seats.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Starts the Prometheus metrics exporter
//! - Provisions the seat pool and seeds the administrator account
//! - Runs the expiry sweeper until Ctrl+C
//!
//! # Usage
//!
//! ```bash
//! SEAT_COUNT=30 SWEEP_INTERVAL_SECS=60 cargo run --bin seat-lease-server
//! ```

use anyhow::Context;
use seat_lease_core::{InMemoryActivityLog, environment::SystemClock};
use seat_lease_runtime::metrics::MetricsServer;
use seat_lease_runtime::{Config, EngineEnvironment, ExpirySweeper, ReservationEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,seat_lease_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        seats = config.seats.count,
        sweep_interval_secs = config.sweeper.interval_secs,
        log_level = %config.server.log_level,
        "Configuration loaded"
    );

    let metrics_addr = config
        .metrics_addr()
        .parse()
        .with_context(|| format!("invalid metrics address {}", config.metrics_addr()))?;
    MetricsServer::new(metrics_addr)
        .start()
        .context("failed to start metrics exporter")?;

    let env = EngineEnvironment::new(Arc::new(SystemClock), Arc::new(InMemoryActivityLog::new()));
    let engine = Arc::new(ReservationEngine::new(env));
    engine.provision_seats(config.seats.count).await;

    if let Some(admin) = &config.admin {
        if engine.directory().find_by_email(&admin.email).await.is_none() {
            engine
                .register_member(&admin.name, &admin.email)
                .await
                .context("failed to seed administrator")?;
        }
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper =
        ExpirySweeper::new(Arc::clone(&engine), config.sweeper.interval()).spawn(shutdown_rx);

    tracing::info!("Seat lease server is running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout), sweeper).await {
        Ok(Ok(())) => tracing::info!("Expiry sweeper stopped gracefully"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Expiry sweeper task failed"),
        Err(_) => tracing::warn!("Expiry sweeper shutdown timed out"),
    }

    let occupancy = engine.occupancy().await;
    tracing::info!(
        occupied = occupancy.occupied,
        total = occupancy.total,
        "Shutdown complete"
    );
    Ok(())
}
