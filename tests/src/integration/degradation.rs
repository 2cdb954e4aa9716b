//! # Notification Degradation
//!
//! When the bus fails, tickets are still stored and answered with 202. After
//! enough consecutive failures the breaker opens and the bus is no longer
//! contacted; once the cooldown passes a single trial call decides whether
//! the circuit closes again.

use std::time::Duration;

use axum::http::StatusCode;
use ingestion_gateway::{CircuitState, GatewayConfig};
use serde_json::json;
use ticket_bus::NotificationPublisher;
use ticket_storage::TicketStore;

use super::harness::GatewayHarness;

fn breaker_config(threshold: u32, timeout_secs: u64) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.circuit_breaker.failure_threshold = threshold;
    config.circuit_breaker.open_timeout_secs = timeout_secs;
    config
}

#[tokio::test]
async fn test_bus_outage_degrades_to_accepted() {
    let harness = GatewayHarness::new(breaker_config(3, 30));
    harness.bus.set_available(false);

    for id in 0..3 {
        let response = harness.freshdesk(&json!({"id": id}), "192.0.2.50").await;
        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.body["status"], "saved_but_publish_failed");
        assert!(response.body["ticket_id"].is_string());
        assert!(response.body["error"].as_str().unwrap().contains("unavailable"));
    }
    assert_eq!(harness.service.breaker().state(), CircuitState::Open);

    // Open: stored, answered 202, bus untouched
    let attempts = harness.bus.messages_published();
    let response = harness.freshdesk(&json!({"id": 99}), "192.0.2.50").await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["error"], "circuit breaker is open");
    assert_eq!(harness.bus.messages_published(), attempts);

    assert_eq!(harness.store.count().await.unwrap(), 4);

    let metrics = harness.get("/metrics/json").await;
    assert_eq!(metrics.body["publish"]["failed"], 3);
    assert_eq!(metrics.body["publish"]["short_circuited"], 1);
    assert_eq!(metrics.body["circuit_breaker"]["state"], 1);
    assert_eq!(metrics.body["webhooks"]["publish_degraded"], 4);
}

#[tokio::test]
async fn test_duplicates_are_not_degraded() {
    let harness = GatewayHarness::new(breaker_config(1, 30));
    harness.bus.set_available(false);

    let first = harness.zendesk(&json!({"id": 1}), "192.0.2.51").await;
    assert_eq!(first.status, StatusCode::ACCEPTED);

    // Already stored: no publish attempt, plain 200
    let again = harness.zendesk(&json!({"id": 1}), "192.0.2.51").await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["status"], "already_exists");
}

#[tokio::test]
async fn test_breaker_recovers_after_cooldown() {
    let harness = GatewayHarness::new(breaker_config(1, 1));
    let mut transitions = harness.service.breaker().subscribe_state();

    harness.bus.set_available(false);
    let failed = harness.freshdesk(&json!({"id": "a"}), "192.0.2.52").await;
    assert_eq!(failed.status, StatusCode::ACCEPTED);
    assert_eq!(*transitions.borrow_and_update(), CircuitState::Open);

    harness.bus.set_available(true);
    let short = harness.freshdesk(&json!({"id": "b"}), "192.0.2.52").await;
    assert_eq!(short.body["error"], "circuit breaker is open");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let trial = harness.freshdesk(&json!({"id": "c"}), "192.0.2.52").await;
    assert_eq!(trial.status, StatusCode::OK);
    assert_eq!(trial.body["status"], "received");
    assert_eq!(harness.service.breaker().state(), CircuitState::Closed);
    assert_eq!(*transitions.borrow_and_update(), CircuitState::Closed);
}
