//! # Admission and Authentication
//!
//! Webhooks are admitted per client by a token bucket, bounded in size and
//! authenticated per provider before anything is parsed or stored.

use axum::body::Body;
use axum::http::{header, StatusCode};
use ingestion_gateway::middleware::auth::{basic_header, sign_hmac, FRESHDESK_SIGNATURE_HEADER};
use ingestion_gateway::GatewayConfig;
use serde_json::json;
use ticket_bus::NotificationPublisher;
use ticket_storage::TicketStore;

use super::harness::{
    secured_config, webhook_request, GatewayHarness, FRESHDESK_PATH, FRESHDESK_SECRET,
    ZENDESK_PATH,
};

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let harness = GatewayHarness::secured();
    let signed = serde_json::to_vec(&json!({"id": 1, "subject": "original"})).unwrap();
    let tampered = serde_json::to_vec(&json!({"id": 1, "subject": "tampered"})).unwrap();

    let response = harness
        .send(
            webhook_request(FRESHDESK_PATH, "203.0.113.1")
                .header(FRESHDESK_SIGNATURE_HEADER, sign_hmac(FRESHDESK_SECRET, &signed))
                .body(Body::from(tampered))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid signature");
    assert_eq!(harness.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_credentials_are_rejected() {
    let harness = GatewayHarness::secured();

    let unsigned = harness
        .send(
            webhook_request(FRESHDESK_PATH, "203.0.113.2")
                .body(Body::from(r#"{"id":1}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(unsigned.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unsigned.body["error"], "Missing X-Freshdesk-Signature header");

    let anonymous = harness
        .send(
            webhook_request(ZENDESK_PATH, "203.0.113.2")
                .body(Body::from(r#"{"id":1}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["error"], "Missing Authorization header");

    let wrong = harness
        .send(
            webhook_request(ZENDESK_PATH, "203.0.113.2")
                .header(header::AUTHORIZATION, basic_header("intruder:guess"))
                .body(Body::from(r#"{"id":1}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["error"], "Invalid credentials");

    let metrics = harness.get("/metrics/json").await;
    assert_eq!(metrics.body["webhooks"]["auth_failed"], 3);
}

#[tokio::test]
async fn test_auth_runs_before_parsing() {
    let harness = GatewayHarness::secured();

    let response = harness
        .send(
            webhook_request(FRESHDESK_PATH, "203.0.113.3")
                .header(FRESHDESK_SIGNATURE_HEADER, "00")
                .body(Body::from("not json at all"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_secret_skips_validation() {
    let mut config = secured_config();
    config.auth.zendesk_secret.clear();
    let harness = GatewayHarness::new(config);

    let open = harness
        .send(
            webhook_request(ZENDESK_PATH, "203.0.113.4")
                .body(Body::from(r#"{"id": "no-auth"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(open.status, StatusCode::OK);
    assert_eq!(open.body["status"], "received");

    // Freshdesk still enforced
    let guarded = harness
        .send(
            webhook_request(FRESHDESK_PATH, "203.0.113.4")
                .body(Body::from(r#"{"id": "no-auth"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(guarded.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let mut config = secured_config();
    // Burst of one, one token every six seconds
    config.rate_limit.requests_per_minute = 10;
    let harness = GatewayHarness::new(config);

    let first = harness.freshdesk(&json!({"id": 1}), "203.0.113.10").await;
    assert_eq!(first.status, StatusCode::OK);

    let second = harness.freshdesk(&json!({"id": 2}), "203.0.113.10").await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        second.body["error"],
        "Rate limit exceeded. Please try again later."
    );
    let retry_after: u64 = second
        .retry_after
        .as_deref()
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header");
    assert!((1..=6).contains(&retry_after));

    // Rejected before auth and storage
    assert_eq!(harness.store.count().await.unwrap(), 1);
    assert_eq!(harness.bus.messages_published(), 1);

    // Other clients have their own bucket
    let other = harness.zendesk(&json!({"id": 3}), "203.0.113.11").await;
    assert_eq!(other.status, StatusCode::OK);

    // Operational endpoints are never limited
    for _ in 0..5 {
        assert_eq!(harness.get("/health").await.status, StatusCode::OK);
    }

    let metrics = harness.get("/metrics/json").await;
    assert_eq!(metrics.body["rate_limiting"]["rejected"], 1);
    assert_eq!(metrics.body["rate_limit_buckets"], 2);
}

#[tokio::test]
async fn test_rate_limit_disabled() {
    let mut config = GatewayConfig::default();
    config.rate_limit.enabled = false;
    config.rate_limit.requests_per_minute = 10;
    let harness = GatewayHarness::new(config);

    for id in 0..5 {
        let response = harness.freshdesk(&json!({"id": id}), "203.0.113.12").await;
        assert_eq!(response.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = GatewayConfig::default();
    config.limits.max_body_bytes = 256;
    let harness = GatewayHarness::new(config);

    let padding = "x".repeat(1024);
    let response = harness
        .freshdesk(&json!({"id": 1, "description": padding}), "203.0.113.20")
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.body["error"].as_str().unwrap().contains("256"));
    assert_eq!(harness.store.count().await.unwrap(), 0);

    let small = harness.freshdesk(&json!({"id": 2}), "203.0.113.20").await;
    assert_eq!(small.status, StatusCode::OK);
}
