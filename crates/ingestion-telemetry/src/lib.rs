//! # Ingestion Telemetry
//!
//! Structured logging and optional distributed tracing for the ingestion
//! service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ingestion_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).await?;
//!     // spans and events are now collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP gRPC endpoint; unset disables export |
//! | `OTEL_SERVICE_NAME` | `ingestion` | Service name in traces |
//! | `ING_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `ING_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{env_filter, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(String),

    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and, when configured, OTLP trace export.
///
/// The returned guard must be held for the lifetime of the process; dropping
/// it flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let tracing = tracing_setup::init_tracing(&config).await?;
    Ok(TelemetryGuard { tracing })
}

/// Guard that keeps telemetry active. Drop to flush and shut down.
pub struct TelemetryGuard {
    tracing: TracingGuard,
}

impl TelemetryGuard {
    pub fn exporting_traces(&self) -> bool {
        self.tracing.exporting()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
