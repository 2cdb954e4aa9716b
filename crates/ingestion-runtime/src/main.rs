//! # Helpdesk Ingestion Service
//!
//! Receives Freshdesk and Zendesk webhooks, stores each ticket once and
//! announces new tickets on `tickets:new`.
//!
//! Configuration comes from the environment; see
//! [`ingestion_runtime::container::config`].

use anyhow::{Context, Result};
use ingestion_runtime::{build_service, shutdown_signal, IngestionConfig};
use ingestion_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Before telemetry, so .env can set the log level
    let _ = dotenvy::dotenv();

    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .await
        .context("failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Helpdesk Ingestion Service v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let config = IngestionConfig::from_env().context("invalid configuration")?;
    info!(
        port = config.gateway.http.port,
        storage = config.storage.kind(),
        bus = config.bus.kind(),
        "Configuration loaded"
    );

    let service = build_service(config)
        .await
        .context("failed to build ingestion service")?;

    let listener = service.bind().await.context("failed to bind HTTP listener")?;
    service
        .serve(listener, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Ingestion service exited cleanly");
    Ok(())
}
