//! # Ingestion Gateway
//!
//! Accepts helpdesk webhooks, authenticates and normalizes them, stores each
//! external ticket exactly once and announces new tickets on the bus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          INGESTION GATEWAY                           │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │   POST /api/v1/ingest/webhook/{freshdesk,zendesk}                    │
//! │                     │                                                │
//! │   ┌─────────────────┴──────────────────┐                             │
//! │   │  Tracing → Metrics → RateLimit     │   tower layers              │
//! │   └─────────────────┬──────────────────┘                             │
//! │                     │ body buffered once                             │
//! │   ┌─────────────────┴──────────────────┐                             │
//! │   │ SignatureValidator → Normalizer    │                             │
//! │   │ → IdempotencyGuard → BreakerPublisher                            │
//! │   └───────┬───────────────────┬────────┘                             │
//! └───────────┼───────────────────┼──────────────────────────────────────┘
//!             ▼                   ▼
//!        TicketStore     NotificationPublisher ("tickets:new")
//! ```
//!
//! # Responses
//!
//! - `200 received`: created and published
//! - `200 already_exists`: natural key seen before, nothing written
//! - `202 saved_but_publish_failed`: created, notification not sent
//! - `400`, `401`, `413`, `429`, `500`: see [`IngestError`]
//!
//! # Usage
//!
//! ```ignore
//! use ingestion_gateway::{GatewayConfig, IngestionService};
//!
//! let service = IngestionService::new(GatewayConfig::default(), store, bus)?;
//! let listener = service.bind().await?;
//! service.serve(listener, shutdown_signal()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod middleware;
pub mod pipeline;
pub mod service;

pub use domain::config::{
    AuthConfig, CircuitBreakerConfig, GatewayConfig, HttpConfig, LimitsConfig,
    NotificationConfig, RateLimitConfig,
};
pub use domain::error::{GatewayError, IngestError};
pub use domain::normalizer::{normalizer_for, NormalizeError, PayloadNormalizer};
pub use middleware::{CircuitBreaker, CircuitState, GatewayMetrics};
pub use pipeline::{IngestionPipeline, PublishOutcome, WebhookResponse};
pub use service::IngestionService;
