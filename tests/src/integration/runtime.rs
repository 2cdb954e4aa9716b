//! # Runtime Wiring
//!
//! Configuration from an environment map through adapter construction to a
//! routable gateway, as the binary does at startup.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ingestion_runtime::container::{BusBackend, StorageBackend};
use ingestion_runtime::{build_service, AdapterError, ConfigError, IngestionConfig};
use tower::ServiceExt;

fn config_from(vars: &[(&str, &str)]) -> Result<IngestionConfig, ConfigError> {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    IngestionConfig::from_lookup(|name| env.get(name).cloned())
}

#[tokio::test]
async fn test_memory_backends_serve_requests() {
    let config = config_from(&[
        ("PORT", "0"),
        ("DATABASE_URL", "memory://"),
        ("REDIS_URL", "memory://"),
        ("RATE_LIMIT_PER_MINUTE", "600"),
        ("CIRCUIT_BREAKER_THRESHOLD", "3"),
    ])
    .unwrap();
    assert_eq!(config.storage, StorageBackend::Memory);
    assert!(matches!(config.bus, BusBackend::Memory));

    let service = build_service(config).await.unwrap();
    assert_eq!(service.config().rate_limit.requests_per_minute, 600);
    assert_eq!(service.config().circuit_breaker.failure_threshold, 3);

    let response = service
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_environment_is_reported() {
    let err = config_from(&[("CIRCUIT_BREAKER_THRESHOLD", "lots")]).unwrap_err();
    assert!(err.to_string().contains("CIRCUIT_BREAKER_THRESHOLD"));

    let err = config_from(&[("DATABASE_URL", "postgres://db/tickets")]).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedUrl { .. }));

    assert!(config_from(&[("MAX_BODY_BYTES", "0")]).is_err());
}

#[tokio::test]
async fn test_rocksdb_backend_follows_feature() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("rocksdb://{}", dir.path().join("tickets").display());
    let config = config_from(&[("DATABASE_URL", url.as_str())]).unwrap();
    assert_eq!(config.storage.kind(), "rocksdb");

    // Feature unification decides whether the backend is compiled in
    match build_service(config).await {
        Err(AdapterError::FeatureDisabled { feature, .. }) => assert_eq!(feature, "rocksdb"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(service) => {
            let response = service
                .router()
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
