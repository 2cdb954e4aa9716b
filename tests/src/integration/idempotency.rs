//! # Idempotent Intake
//!
//! Providers redeliver webhooks. However many copies arrive, and however
//! they interleave, exactly one ticket exists per natural key and only the
//! first delivery is announced.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;
use futures::future::join_all;
use serde_json::json;
use ticket_bus::NotificationPublisher;
use ticket_storage::TicketStore;

use super::harness::GatewayHarness;

#[tokio::test]
async fn test_sequential_redelivery() {
    let harness = GatewayHarness::secured();
    let payload = json!({"id": 5150, "subject": "Again?"});

    let first = harness.freshdesk(&payload, "192.0.2.1").await;
    let second = harness.freshdesk(&payload, "192.0.2.1").await;
    let third = harness.freshdesk(&payload, "192.0.2.2").await;

    assert_eq!(first.body["status"], "received");
    for retry in [&second, &third] {
        assert_eq!(retry.status, StatusCode::OK);
        assert_eq!(retry.body["status"], "already_exists");
        assert_eq!(retry.body["ticket_id"], first.body["ticket_id"]);
        assert_eq!(retry.body["message"], "Ticket already processed (idempotent)");
    }

    assert_eq!(harness.store.count().await.unwrap(), 1);
    assert_eq!(harness.bus.messages_published(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redelivery_creates_once() {
    let harness = Arc::new(GatewayHarness::secured());
    let payload = json!({"ticket": {"id": "zd-race", "subject": "Burst"}});

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let harness = Arc::clone(&harness);
            let payload = payload.clone();
            // Distinct clients so the limiter stays out of the way
            let client = format!("10.1.0.{}", i);
            tokio::spawn(async move { harness.zendesk(&payload, &client).await })
        })
        .collect();

    let responses: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let received = responses
        .iter()
        .filter(|r| r.body["status"] == "received")
        .count();
    assert_eq!(received, 1, "exactly one delivery creates the ticket");

    let ids: HashSet<String> = responses
        .iter()
        .map(|r| {
            assert_eq!(r.status, StatusCode::OK);
            r.body["ticket_id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids.len(), 1, "every response names the same ticket");

    assert_eq!(harness.store.count().await.unwrap(), 1);
    assert_eq!(harness.bus.messages_published(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_tickets_all_created() {
    let harness = Arc::new(GatewayHarness::open());

    let handles: Vec<_> = (0..25)
        .map(|i| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move {
                harness
                    .freshdesk(&json!({"id": i}), &format!("10.2.0.{}", i))
                    .await
            })
        })
        .collect();

    for response in join_all(handles).await {
        assert_eq!(response.unwrap().body["status"], "received");
    }
    assert_eq!(harness.store.count().await.unwrap(), 25);
}
