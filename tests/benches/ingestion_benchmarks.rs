//! # Ingestion Hot-Path Benchmarks
//!
//! | Stage | Operation |
//! |-------|-----------|
//! | Normalization | Freshdesk flat / Zendesk nested payload to ticket |
//! | Authentication | HMAC-SHA256 signing and constant-time compare |
//! | Admission | Token bucket check, single client and many clients |
//! | Breaker | Permit acquire and success record while closed |
//! | Storage | In-memory create and natural-key lookup |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ingestion_gateway::middleware::auth::{constant_time_compare, sign_hmac};
use ingestion_gateway::middleware::{CircuitBreaker, CircuitBreakerConfig, RateLimitState};
use ingestion_gateway::{normalizer_for, GatewayMetrics, RateLimitConfig};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use ticket_storage::{InMemoryTicketStore, TicketStore};
use ticket_types::{CanonicalTicket, NaturalKey, Provider};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("benchmark payloads are objects"),
    }
}

// ============================================================================
// Normalization
// ============================================================================

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");

    let freshdesk = object(json!({
        "id": 4242,
        "subject": "Printer on fire",
        "description": "Smoke everywhere",
        "priority": 4,
        "status": 2,
        "email": "ada@example.com",
        "name": "Ada",
        "tags": ["hardware", "urgent"]
    }));
    let zendesk = object(json!({
        "ticket": {
            "id": 9001,
            "subject": "Cannot log in",
            "description": "Password reset loop",
            "status": "new",
            "priority": "high",
            "requester": {"name": "Grace", "email": "grace@example.com"},
            "tags": ["auth"]
        }
    }));

    group.bench_function("freshdesk", |b| {
        let normalizer = normalizer_for(Provider::Freshdesk);
        b.iter(|| black_box(normalizer.normalize(black_box(&freshdesk)).is_ok()))
    });
    group.bench_function("zendesk_nested", |b| {
        let normalizer = normalizer_for(Provider::Zendesk);
        b.iter(|| black_box(normalizer.normalize(black_box(&zendesk)).is_ok()))
    });

    group.finish();
}

// ============================================================================
// Authentication
// ============================================================================

fn bench_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature");

    for size in [256usize, 4 * 1024, 64 * 1024] {
        let body = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("hmac_sha256", size), &body, |b, body| {
            b.iter(|| black_box(sign_hmac("webhook-secret", body)))
        });
    }

    let expected = sign_hmac("webhook-secret", b"payload");
    let mut forged = expected.clone();
    forged.replace_range(..2, "00");
    group.bench_function("constant_time_compare", |b| {
        b.iter(|| black_box(constant_time_compare(&expected, &forged)))
    });

    group.finish();
}

// ============================================================================
// Admission
// ============================================================================

fn bench_rate_limit(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit");

    let config = RateLimitConfig {
        requests_per_minute: u32::MAX,
        ..RateLimitConfig::default()
    };
    let state = RateLimitState::new(config.clone(), Arc::new(GatewayMetrics::default()));

    group.bench_function("single_client", |b| {
        b.iter(|| black_box(state.check(black_box("203.0.113.1")).is_ok()))
    });

    for clients in [100usize, 1_000, 10_000] {
        let keys: Vec<String> = (0..clients).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
        let state = RateLimitState::new(config.clone(), Arc::new(GatewayMetrics::default()));
        group.throughput(Throughput::Elements(clients as u64));
        group.bench_with_input(BenchmarkId::new("many_clients", clients), &keys, |b, keys| {
            b.iter(|| {
                let now = Instant::now();
                let admitted = keys
                    .iter()
                    .filter(|k| state.check_at(k, now).is_ok())
                    .count();
                black_box(admitted)
            })
        });
    }

    group.finish();
}

// ============================================================================
// Breaker
// ============================================================================

fn bench_breaker(c: &mut Criterion) {
    let breaker = CircuitBreaker::new(
        "bench",
        CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        },
        Arc::new(GatewayMetrics::default()),
    );

    c.bench_function("breaker_acquire_success", |b| {
        b.iter(|| {
            if let Ok(permit) = breaker.try_acquire() {
                breaker.record_success(permit);
            }
        })
    });
}

// ============================================================================
// Storage
// ============================================================================

fn bench_memory_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_store");
    group.measurement_time(Duration::from_secs(5));

    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");

    group.bench_function("insert", |b| {
        let store = InMemoryTicketStore::new();
        let mut next = 0u64;
        b.iter(|| {
            next += 1;
            let ticket = CanonicalTicket::new("freshdesk", next.to_string());
            rt.block_on(store.insert(&ticket)).is_ok()
        })
    });

    let store = InMemoryTicketStore::new();
    rt.block_on(async {
        for i in 0..10_000u64 {
            let ticket = CanonicalTicket::new("zendesk", i.to_string());
            let _ = store.insert(&ticket).await;
        }
    });
    let key = NaturalKey::new("zendesk", "5000");
    group.bench_function("find_by_natural_key", |b| {
        b.iter(|| black_box(rt.block_on(store.find_by_natural_key(&key)).is_ok()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_normalization,
    bench_signature,
    bench_rate_limit,
    bench_breaker,
    bench_memory_store,
);
criterion_main!(benches);
