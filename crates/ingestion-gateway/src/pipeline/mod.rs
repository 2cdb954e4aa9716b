//! # Ingestion Pipeline
//!
//! Per inbound webhook, after the rate limiter admitted it:
//!
//! ```text
//! raw body ──► SignatureValidator ──► JSON parse ──► PayloadNormalizer
//!                                                         │
//!        response ◄── BreakerPublisher ◄── IdempotencyGuard
//! ```
//!
//! The body is buffered once by the HTTP handler; validation and parsing
//! both borrow the same [`Bytes`]. Only a newly created ticket is published.

pub mod idempotency;
pub mod publisher;

pub use idempotency::{IdempotencyGuard, IngestOutcome};
pub use publisher::{BreakerPublisher, PublishOutcome};

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde_json::{json, Map, Value};
use ticket_types::Provider;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::error::IngestError;
use crate::domain::normalizer::normalizer_for;
use crate::middleware::auth::SignatureValidator;
use crate::middleware::metrics::GatewayMetrics;

/// Message attached to duplicate deliveries.
pub const ALREADY_PROCESSED_MESSAGE: &str = "Ticket already processed (idempotent)";

/// Successful pipeline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResponse {
    /// Created and published.
    Received { ticket_id: Uuid },
    /// Natural key seen before; nothing written or published.
    AlreadyExists { ticket_id: Uuid },
    /// Created, but notification did not go out.
    SavedButPublishFailed { ticket_id: Uuid, error: String },
}

impl WebhookResponse {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookResponse::Received { .. } | WebhookResponse::AlreadyExists { .. } => {
                StatusCode::OK
            }
            WebhookResponse::SavedButPublishFailed { .. } => StatusCode::ACCEPTED,
        }
    }

    pub fn ticket_id(&self) -> Uuid {
        match self {
            WebhookResponse::Received { ticket_id }
            | WebhookResponse::AlreadyExists { ticket_id }
            | WebhookResponse::SavedButPublishFailed { ticket_id, .. } => *ticket_id,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            WebhookResponse::Received { ticket_id } => json!({
                "status": "received",
                "ticket_id": ticket_id,
            }),
            WebhookResponse::AlreadyExists { ticket_id } => json!({
                "status": "already_exists",
                "ticket_id": ticket_id,
                "message": ALREADY_PROCESSED_MESSAGE,
            }),
            WebhookResponse::SavedButPublishFailed { ticket_id, error } => json!({
                "status": "saved_but_publish_failed",
                "ticket_id": ticket_id,
                "error": error,
            }),
        }
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Composes authentication, normalization, persistence and notification.
pub struct IngestionPipeline {
    freshdesk: SignatureValidator,
    zendesk: SignatureValidator,
    guard: IdempotencyGuard,
    publisher: BreakerPublisher,
    metrics: Arc<GatewayMetrics>,
}

impl IngestionPipeline {
    pub fn new(
        freshdesk: SignatureValidator,
        zendesk: SignatureValidator,
        guard: IdempotencyGuard,
        publisher: BreakerPublisher,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            freshdesk,
            zendesk,
            guard,
            publisher,
            metrics,
        }
    }

    pub fn validator(&self, provider: Provider) -> &SignatureValidator {
        match provider {
            Provider::Freshdesk => &self.freshdesk,
            Provider::Zendesk => &self.zendesk,
        }
    }

    pub fn publisher(&self) -> &BreakerPublisher {
        &self.publisher
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Run one buffered webhook through the pipeline and count its outcome.
    pub async fn process(
        &self,
        provider: Provider,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Result<WebhookResponse, IngestError> {
        let result = self.run(provider, headers, body).await;
        self.record_outcome(&result);
        result
    }

    async fn run(
        &self,
        provider: Provider,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Result<WebhookResponse, IngestError> {
        if let Err(e) = self.validator(provider).validate(headers, body) {
            warn!(provider = %provider, error = %e, "Webhook authentication failed");
            return Err(e);
        }

        let payload = parse_object(body)?;

        let ticket = normalizer_for(provider)
            .normalize(&payload)
            .map_err(|e| IngestError::malformed(format!("Failed to normalize ticket: {}", e)))?;

        match self.guard.ingest(&ticket).await? {
            IngestOutcome::AlreadyExists(ticket_id) => {
                debug!(provider = %provider, external_id = %ticket.external_id, %ticket_id, "Duplicate webhook");
                Ok(WebhookResponse::AlreadyExists { ticket_id })
            }
            IngestOutcome::Created(ticket_id) => {
                let outcome = self.publisher.publish(&ticket).await;
                match outcome.failure_reason() {
                    None => {
                        info!(provider = %provider, external_id = %ticket.external_id, %ticket_id, "Webhook ingested");
                        Ok(WebhookResponse::Received { ticket_id })
                    }
                    Some(error) => {
                        warn!(
                            provider = %provider,
                            %ticket_id,
                            error = %error,
                            "Ticket saved but notification not sent"
                        );
                        Ok(WebhookResponse::SavedButPublishFailed { ticket_id, error })
                    }
                }
            }
        }
    }

    fn record_outcome(&self, result: &Result<WebhookResponse, IngestError>) {
        let counter = match result {
            Ok(WebhookResponse::Received { .. }) => &self.metrics.webhooks_received,
            Ok(WebhookResponse::AlreadyExists { .. }) => &self.metrics.webhooks_duplicate,
            Ok(WebhookResponse::SavedButPublishFailed { .. }) => {
                &self.metrics.webhooks_publish_degraded
            }
            Err(IngestError::Authentication(_)) => &self.metrics.webhooks_auth_failed,
            Err(IngestError::MalformedPayload(_)) => &self.metrics.webhooks_malformed,
            Err(IngestError::PayloadTooLarge { .. }) => &self.metrics.webhooks_too_large,
            Err(IngestError::Storage(_)) => &self.metrics.webhooks_storage_failed,
            // Counted by the limiter itself
            Err(IngestError::RateLimited { .. }) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Parse the buffered body as a JSON object.
fn parse_object(body: &[u8]) -> Result<Map<String, Value>, IngestError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(IngestError::malformed(
            "Invalid JSON payload: expected a JSON object",
        )),
        Err(e) => {
            debug!(error = %e, "Webhook body is not valid JSON");
            Err(IngestError::malformed("Invalid JSON payload"))
        }
    }
}
