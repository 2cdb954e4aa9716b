//! # Live Server
//!
//! Serves the gateway on an ephemeral port and talks raw HTTP/1.1 to it,
//! then checks that the shutdown future stops the server cleanly.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use ingestion_gateway::{GatewayConfig, IngestionService};
use ticket_bus::InMemoryTicketBus;
use ticket_storage::InMemoryTicketStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn test_serves_and_shuts_down() {
    let service = IngestionService::new(
        GatewayConfig::default(),
        Arc::new(InMemoryTicketStore::new()),
        Arc::new(InMemoryTicketBus::new()),
    )
    .unwrap();

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(service.serve(listener, async {
        shutdown_rx.await.ok();
    }));

    let health = timeout(
        Duration::from_secs(5),
        raw_request(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        ),
    )
    .await
    .expect("health response in time");
    assert!(health.starts_with("HTTP/1.1 200"), "got: {}", health);
    assert!(health.contains("ingestion"));

    let body = r#"{"id": "live-1", "subject": "Over the wire"}"#;
    let webhook = timeout(
        Duration::from_secs(5),
        raw_request(
            addr,
            &format!(
                "POST /api/v1/ingest/webhook/freshdesk HTTP/1.1\r\nHost: localhost\r\n\
                 Content-Type: application/json\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{}",
                body.len(),
                body
            ),
        ),
    )
    .await
    .expect("webhook response in time");
    assert!(webhook.starts_with("HTTP/1.1 200"), "got: {}", webhook);
    assert!(webhook.contains("received"));

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
