//! # Gateway Test Harness
//!
//! Builds an [`IngestionService`] over in-memory adapters and sends requests
//! through its router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use ingestion_gateway::middleware::auth::{basic_header, sign_hmac, FRESHDESK_SIGNATURE_HEADER};
use ingestion_gateway::{GatewayConfig, IngestionService};
use serde_json::Value;
use ticket_bus::InMemoryTicketBus;
use ticket_storage::InMemoryTicketStore;
use tower::ServiceExt;

pub const FRESHDESK_PATH: &str = "/api/v1/ingest/webhook/freshdesk";
pub const ZENDESK_PATH: &str = "/api/v1/ingest/webhook/zendesk";

pub const FRESHDESK_SECRET: &str = "freshdesk-webhook-secret";
pub const ZENDESK_SECRET: &str = "zendesk-bot:correct-horse";

/// A running gateway and handles on its collaborators.
pub struct GatewayHarness {
    pub service: IngestionService,
    pub router: Router,
    pub store: Arc<InMemoryTicketStore>,
    pub bus: Arc<InMemoryTicketBus>,
}

/// Status plus parsed JSON body.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub retry_after: Option<String>,
    pub body: Value,
}

impl GatewayHarness {
    pub fn new(config: GatewayConfig) -> Self {
        let store = Arc::new(InMemoryTicketStore::new());
        let bus = Arc::new(InMemoryTicketBus::new());
        let service = IngestionService::new(config, store.clone(), bus.clone())
            .expect("valid gateway config");
        let router = service.router();
        Self {
            service,
            router,
            store,
            bus,
        }
    }

    /// Default configuration with both provider secrets set.
    pub fn secured() -> Self {
        Self::new(secured_config())
    }

    /// Default configuration with validation disabled for both providers.
    pub fn open() -> Self {
        Self::new(GatewayConfig::default())
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            retry_after,
            body,
        }
    }

    /// POST a Freshdesk webhook signed with [`FRESHDESK_SECRET`].
    pub async fn freshdesk(&self, payload: &Value, client: &str) -> TestResponse {
        let body = serde_json::to_vec(payload).expect("serializable payload");
        let signature = sign_hmac(FRESHDESK_SECRET, &body);
        self.send(
            webhook_request(FRESHDESK_PATH, client)
                .header(FRESHDESK_SIGNATURE_HEADER, signature)
                .body(Body::from(body))
                .expect("valid request"),
        )
        .await
    }

    /// POST a Zendesk webhook with [`ZENDESK_SECRET`] Basic credentials.
    pub async fn zendesk(&self, payload: &Value, client: &str) -> TestResponse {
        let body = serde_json::to_vec(payload).expect("serializable payload");
        self.send(
            webhook_request(ZENDESK_PATH, client)
                .header(header::AUTHORIZATION, basic_header(ZENDESK_SECRET))
                .body(Body::from(body))
                .expect("valid request"),
        )
        .await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
    }
}

pub fn secured_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.freshdesk_secret = FRESHDESK_SECRET.to_string();
    config.auth.zendesk_secret = ZENDESK_SECRET.to_string();
    config
}

/// Webhook POST builder attributed to `client` via `X-Forwarded-For`.
pub fn webhook_request(path: &str, client: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
}
