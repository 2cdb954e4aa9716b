//! Ingestion service - HTTP surface of the gateway.
//!
//! Routes:
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | POST | `/api/v1/ingest/webhook/freshdesk` | rate limited, HMAC signature |
//! | POST | `/api/v1/ingest/webhook/zendesk` | rate limited, Basic credentials |
//! | GET | `/health` | liveness |
//! | GET | `/metrics` | Prometheus text |
//! | GET | `/metrics/json` | counters, breaker and limiter state |

use crate::domain::config::GatewayConfig;
use crate::domain::error::{GatewayError, IngestError};
use crate::middleware::rate_limit::cleanup_task;
use crate::middleware::{
    CircuitBreaker, GatewayMetrics, MetricsLayer, RateLimitLayer, RateLimitState,
    SignatureValidator, TracingLayer,
};
use crate::pipeline::{BreakerPublisher, IdempotencyGuard, IngestionPipeline};
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use ticket_bus::NotificationPublisher;
use ticket_storage::TicketStore;
use ticket_types::Provider;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{debug, info, warn};

/// Path prefix of the webhook routes.
pub const INGEST_PREFIX: &str = "/api/v1/ingest";

/// Breaker name used in logs and stats.
pub const NOTIFICATION_BREAKER: &str = "notifications";

/// Error returned when the request body cannot be read to the end.
pub const BODY_READ_FAILED_MESSAGE: &str = "Failed to read request body";

/// Wired gateway: configuration plus every shared component.
pub struct IngestionService {
    config: GatewayConfig,
    pipeline: Arc<IngestionPipeline>,
    rate_limit: Arc<RateLimitState>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<GatewayMetrics>,
}

impl IngestionService {
    /// Validate the configuration and build the pipeline over `store` and `bus`.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn TicketStore>,
        bus: Arc<dyn NotificationPublisher>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let metrics = Arc::new(GatewayMetrics::new());

        let breaker = Arc::new(CircuitBreaker::new(
            NOTIFICATION_BREAKER,
            config.circuit_breaker.to_middleware_config(),
            Arc::clone(&metrics),
        ));

        let rate_limit = Arc::new(RateLimitState::new(
            config.rate_limit.clone(),
            Arc::clone(&metrics),
        ));

        let freshdesk = SignatureValidator::for_provider(Provider::Freshdesk, &config.auth);
        let zendesk = SignatureValidator::for_provider(Provider::Zendesk, &config.auth);
        for validator in [&freshdesk, &zendesk] {
            if validator.is_enforced() {
                info!(provider = %validator.provider(), "Webhook signature validation enabled");
            } else {
                warn!(
                    provider = %validator.provider(),
                    "Webhook signature validation DISABLED (no secret configured)"
                );
            }
        }

        let pipeline = Arc::new(IngestionPipeline::new(
            freshdesk,
            zendesk,
            IdempotencyGuard::new(store, Arc::clone(&metrics)),
            BreakerPublisher::new(
                bus,
                Arc::clone(&breaker),
                config.notifications.channel.clone(),
                Arc::clone(&metrics),
            ),
            Arc::clone(&metrics),
        ));

        Ok(Self {
            config,
            pipeline,
            rate_limit,
            breaker,
            metrics,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    pub fn rate_limit(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.rate_limit)
    }

    pub fn pipeline(&self) -> Arc<IngestionPipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let state = AppState {
            pipeline: Arc::clone(&self.pipeline),
            rate_limit: Arc::clone(&self.rate_limit),
            breaker: Arc::clone(&self.breaker),
            metrics: Arc::clone(&self.metrics),
            max_body_bytes: self.config.limits.max_body_bytes,
        };

        let webhooks = Router::new()
            .route("/webhook/freshdesk", post(freshdesk_webhook))
            .route("/webhook/zendesk", post(zendesk_webhook))
            .layer(RateLimitLayer::new(Arc::clone(&self.rate_limit)));

        let middleware = ServiceBuilder::new()
            .layer(TracingLayer::new())
            .layer(MetricsLayer::new(Arc::clone(&self.metrics)));

        Router::new()
            .nest(INGEST_PREFIX, webhooks)
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_text))
            .route("/metrics/json", get(metrics_json))
            .layer(middleware)
            .with_state(state)
    }

    /// Bind the configured HTTP address.
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self.config.http_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        let rate_limit = &self.config.rate_limit;
        let cleanup = tokio::spawn(cleanup_task(
            Arc::clone(&self.rate_limit),
            rate_limit.cleanup_interval,
            rate_limit.idle_timeout,
        ));

        info!(
            addr = %addr,
            rate_limit_enabled = rate_limit.enabled,
            requests_per_minute = rate_limit.requests_per_minute,
            max_clients = rate_limit.max_clients,
            breaker_threshold = self.config.circuit_breaker.failure_threshold,
            breaker_timeout_secs = self.config.circuit_breaker.open_timeout_secs,
            store = self.pipeline.guard().store().kind(),
            bus = self.pipeline.publisher().bus().kind(),
            "Ingestion service listening"
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        cleanup.abort();
        info!("Ingestion service stopped");
        result.map_err(|e| GatewayError::Serve(e.to_string()))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    pipeline: Arc<IngestionPipeline>,
    rate_limit: Arc<RateLimitState>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<GatewayMetrics>,
    max_body_bytes: usize,
}

async fn freshdesk_webhook(State(state): State<AppState>, request: Request) -> Response {
    handle_webhook(state, Provider::Freshdesk, request).await
}

async fn zendesk_webhook(State(state): State<AppState>, request: Request) -> Response {
    handle_webhook(state, Provider::Zendesk, request).await
}

/// Buffer the body once, then hand headers and bytes to the pipeline.
async fn handle_webhook(state: AppState, provider: Provider, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match buffer_body(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let counter = match e {
                IngestError::PayloadTooLarge { .. } => &state.metrics.webhooks_too_large,
                _ => &state.metrics.webhooks_malformed,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            warn!(provider = %provider, limit = state.max_body_bytes, error = %e, "Webhook body rejected");
            return e.into_response();
        }
    };

    match state.pipeline.process(provider, &parts.headers, &bytes).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Read at most `limit` bytes. Only an exceeded limit is a 413; a body that
/// fails mid-stream is reported as unreadable.
async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, IngestError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(IngestError::PayloadTooLarge { limit }),
        Err(e) => {
            debug!(error = %e, "Webhook body read failed");
            Err(IngestError::malformed(BODY_READ_FAILED_MESSAGE))
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ingestion"
    }))
}

async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

async fn metrics_json(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = state.metrics.to_json();
    if let Some(object) = body.as_object_mut() {
        object.insert(
            "circuit".into(),
            serde_json::to_value(state.breaker.stats()).unwrap_or_default(),
        );
        object.insert(
            "rate_limit_buckets".into(),
            state.rate_limit.bucket_count().into(),
        );
    }
    Json(body)
}
