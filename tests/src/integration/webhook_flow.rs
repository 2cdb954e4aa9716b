//! # Webhook Flow
//!
//! A genuine webhook from each provider is authenticated, normalized,
//! stored once and announced on `tickets:new`.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use ticket_bus::NotificationPublisher;
use ticket_storage::TicketStore;
use ticket_types::{NaturalKey, Priority};
use tokio::time::timeout;
use uuid::Uuid;

use super::harness::GatewayHarness;

fn ticket_id(body: &serde_json::Value) -> Uuid {
    body["ticket_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("no ticket_id in {}", body))
}

#[tokio::test]
async fn test_freshdesk_webhook_is_stored_and_announced() {
    let harness = GatewayHarness::secured();
    let mut subscriber = harness.bus.subscribe();

    let response = harness
        .freshdesk(
            &json!({
                "id": 42,
                "subject": "Help",
                "description": "Printer on fire",
                "priority": 3,
                "email": "ada@example.com",
                "name": "Ada"
            }),
            "198.51.100.10",
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "received");
    let id = ticket_id(&response.body);

    let stored = harness.store.get(id).await.unwrap().expect("stored ticket");
    assert_eq!(stored.external_source, "freshdesk");
    assert_eq!(stored.external_id, "42");
    assert_eq!(stored.title, "Help");
    assert_eq!(stored.priority, Priority::High);
    assert_eq!(stored.status, "open");
    assert_eq!(stored.customer_email, "ada@example.com");
    assert_eq!(stored.entities["description"], "Printer on fire");

    let notification = timeout(Duration::from_millis(500), subscriber.recv())
        .await
        .expect("timeout waiting for notification")
        .expect("notification");
    assert_eq!(notification.channel, "tickets:new");

    let announced = notification.ticket().unwrap();
    assert_eq!(announced.id, id);
    assert_eq!(announced, stored);

    // Wire format: priority as its string form
    let wire: serde_json::Value = serde_json::from_str(&notification.payload).unwrap();
    assert_eq!(wire["priority"], "high");
    assert_eq!(wire["external_id"], "42");
}

#[tokio::test]
async fn test_zendesk_nested_webhook() {
    let harness = GatewayHarness::secured();

    let response = harness
        .zendesk(
            &json!({
                "ticket": {
                    "id": 9001,
                    "subject": "Cannot log in",
                    "description": "Password reset loop",
                    "status": "new",
                    "priority": "urgent",
                    "requester": {"name": "Grace", "email": "grace@example.com"}
                }
            }),
            "198.51.100.11",
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let stored = harness
        .store
        .find_by_natural_key(&NaturalKey::new("zendesk", "9001"))
        .await
        .unwrap()
        .expect("stored ticket");

    assert_eq!(stored.id, ticket_id(&response.body));
    assert_eq!(stored.status, "new");
    assert_eq!(stored.priority, Priority::Urgent);
    assert_eq!(stored.customer_name, "Grace");
    assert!(stored.entities.contains_key("ticket"));
}

#[tokio::test]
async fn test_same_external_id_from_both_providers() {
    let harness = GatewayHarness::secured();

    let fd = harness.freshdesk(&json!({"id": "77"}), "198.51.100.12").await;
    let zd = harness.zendesk(&json!({"id": 77}), "198.51.100.12").await;

    assert_eq!(fd.body["status"], "received");
    assert_eq!(zd.body["status"], "received");
    assert_ne!(ticket_id(&fd.body), ticket_id(&zd.body));
    assert_eq!(harness.store.count().await.unwrap(), 2);
    assert_eq!(harness.bus.messages_published(), 2);
}

#[tokio::test]
async fn test_malformed_payloads_store_nothing() {
    let harness = GatewayHarness::open();

    let not_object = harness.zendesk(&json!(["a", "b"]), "198.51.100.13").await;
    assert_eq!(not_object.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        not_object.body["error"],
        "Invalid JSON payload: expected a JSON object"
    );

    let no_id = harness
        .freshdesk(&json!({"subject": "missing id"}), "198.51.100.13")
        .await;
    assert_eq!(no_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        no_id.body["error"],
        "Failed to normalize ticket: missing external id"
    );

    assert_eq!(harness.store.count().await.unwrap(), 0);
    assert_eq!(harness.bus.messages_published(), 0);
}

#[tokio::test]
async fn test_metrics_reflect_outcomes() {
    let harness = GatewayHarness::open();

    harness.freshdesk(&json!({"id": 1}), "198.51.100.14").await;
    harness.freshdesk(&json!({"id": 1}), "198.51.100.14").await;
    harness.freshdesk(&json!({"no": "id"}), "198.51.100.14").await;

    let metrics = harness.get("/metrics/json").await;
    assert_eq!(metrics.status, StatusCode::OK);
    assert_eq!(metrics.body["webhooks"]["received"], 1);
    assert_eq!(metrics.body["webhooks"]["duplicate"], 1);
    assert_eq!(metrics.body["webhooks"]["malformed"], 1);
    assert_eq!(metrics.body["publish"]["delivered"], 1);
    assert_eq!(metrics.body["circuit"]["state"], "closed");
}
