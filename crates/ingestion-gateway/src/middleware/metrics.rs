//! Gateway counters and their Prometheus / JSON exposition.
//!
//! Also provides [`MetricsLayer`], which tracks in-flight requests and total
//! HTTP latency for every route.

use axum::{body::Body, http::Request, response::Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

use crate::middleware::circuit_breaker::CircuitState;

/// Ingestion gateway metrics
#[derive(Default)]
pub struct GatewayMetrics {
    // HTTP
    pub http_requests_total: AtomicU64,
    pub http_requests_in_flight: AtomicU64,
    pub http_latency_us_total: AtomicU64,

    // Webhook outcomes
    pub webhooks_received: AtomicU64,
    pub webhooks_duplicate: AtomicU64,
    pub webhooks_publish_degraded: AtomicU64,
    pub webhooks_auth_failed: AtomicU64,
    pub webhooks_malformed: AtomicU64,
    pub webhooks_too_large: AtomicU64,
    pub webhooks_storage_failed: AtomicU64,

    // Rate limiting
    pub rate_limit_rejected: AtomicU64,
    pub rate_limit_evictions: AtomicU64,

    // Notification
    pub publish_delivered: AtomicU64,
    pub publish_failed: AtomicU64,
    pub publish_short_circuited: AtomicU64,

    // Circuit breaker
    pub breaker_transitions: AtomicU64,
    pub breaker_state: AtomicU64,

    // Collaborator latency
    pub storage_ops: AtomicU64,
    pub storage_latency_us_total: AtomicU64,
    pub bus_ops: AtomicU64,
    pub bus_latency_us_total: AtomicU64,
}

fn average_ms(total_us: &AtomicU64, count: &AtomicU64) -> f64 {
    let count = count.load(Ordering::Relaxed);
    if count == 0 {
        0.0
    } else {
        total_us.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_eviction(&self) {
        self.rate_limit_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_breaker_transition(&self, to: CircuitState) {
        self.breaker_transitions.fetch_add(1, Ordering::Relaxed);
        self.breaker_state.store(to.gauge_value(), Ordering::Relaxed);
    }

    pub fn record_storage_latency(&self, elapsed: Duration) {
        self.storage_ops.fetch_add(1, Ordering::Relaxed);
        self.storage_latency_us_total
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_bus_latency(&self, elapsed: Duration) {
        self.bus_ops.fetch_add(1, Ordering::Relaxed);
        self.bus_latency_us_total
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn average_http_latency_ms(&self) -> f64 {
        average_ms(&self.http_latency_us_total, &self.http_requests_total)
    }

    pub fn average_storage_latency_ms(&self) -> f64 {
        average_ms(&self.storage_latency_us_total, &self.storage_ops)
    }

    pub fn average_bus_latency_ms(&self) -> f64 {
        average_ms(&self.bus_latency_us_total, &self.bus_ops)
    }

    /// Export metrics in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        let counter = |out: &mut String, name: &str, help: &str, value: u64| {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        };

        counter(
            &mut output,
            "ingestion_http_requests_total",
            "Total number of HTTP requests",
            self.http_requests_total.load(Ordering::Relaxed),
        );
        output.push_str(&format!(
            "# HELP ingestion_http_requests_in_flight Current number of HTTP requests being processed\n\
             # TYPE ingestion_http_requests_in_flight gauge\n\
             ingestion_http_requests_in_flight {}\n",
            self.http_requests_in_flight.load(Ordering::Relaxed)
        ));

        output.push_str(
            "# HELP ingestion_webhooks_total Webhook requests by outcome\n\
             # TYPE ingestion_webhooks_total counter\n",
        );
        for (outcome, value) in self.outcomes() {
            output.push_str(&format!(
                "ingestion_webhooks_total{{outcome=\"{}\"}} {}\n",
                outcome, value
            ));
        }

        counter(
            &mut output,
            "ingestion_rate_limit_exceeded_total",
            "Total number of rate limit exceeded events",
            self.rate_limit_rejected.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "ingestion_rate_limit_evictions_total",
            "Buckets evicted to stay within the client table capacity",
            self.rate_limit_evictions.load(Ordering::Relaxed),
        );

        output.push_str(
            "# HELP ingestion_publish_total Notification publish attempts by result\n\
             # TYPE ingestion_publish_total counter\n",
        );
        for (result, value) in [
            ("delivered", &self.publish_delivered),
            ("failed", &self.publish_failed),
            ("short_circuited", &self.publish_short_circuited),
        ] {
            output.push_str(&format!(
                "ingestion_publish_total{{result=\"{}\"}} {}\n",
                result,
                value.load(Ordering::Relaxed)
            ));
        }

        counter(
            &mut output,
            "ingestion_circuit_breaker_transitions_total",
            "Circuit breaker state transitions",
            self.breaker_transitions.load(Ordering::Relaxed),
        );
        output.push_str(&format!(
            "# HELP ingestion_circuit_breaker_state Circuit breaker state (0=closed, 1=open, 2=half-open)\n\
             # TYPE ingestion_circuit_breaker_state gauge\n\
             ingestion_circuit_breaker_state{{name=\"notifications\"}} {}\n",
            self.breaker_state.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP ingestion_average_latency_ms Average latency by component\n\
             # TYPE ingestion_average_latency_ms gauge\n\
             ingestion_average_latency_ms{{component=\"http\"}} {:.3}\n\
             ingestion_average_latency_ms{{component=\"storage\"}} {:.3}\n\
             ingestion_average_latency_ms{{component=\"bus\"}} {:.3}\n",
            self.average_http_latency_ms(),
            self.average_storage_latency_ms(),
            self.average_bus_latency_ms()
        ));

        output
    }

    fn outcomes(&self) -> [(&'static str, u64); 7] {
        [
            ("received", self.webhooks_received.load(Ordering::Relaxed)),
            ("duplicate", self.webhooks_duplicate.load(Ordering::Relaxed)),
            (
                "publish_degraded",
                self.webhooks_publish_degraded.load(Ordering::Relaxed),
            ),
            ("auth_failed", self.webhooks_auth_failed.load(Ordering::Relaxed)),
            ("malformed", self.webhooks_malformed.load(Ordering::Relaxed)),
            ("too_large", self.webhooks_too_large.load(Ordering::Relaxed)),
            (
                "storage_failed",
                self.webhooks_storage_failed.load(Ordering::Relaxed),
            ),
        ]
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let outcomes: serde_json::Map<String, serde_json::Value> = self
            .outcomes()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into()))
            .collect();

        serde_json::json!({
            "http": {
                "total": self.http_requests_total.load(Ordering::Relaxed),
                "in_flight": self.http_requests_in_flight.load(Ordering::Relaxed),
                "average_latency_ms": self.average_http_latency_ms(),
            },
            "webhooks": outcomes,
            "rate_limiting": {
                "rejected": self.rate_limit_rejected.load(Ordering::Relaxed),
                "evictions": self.rate_limit_evictions.load(Ordering::Relaxed),
            },
            "publish": {
                "delivered": self.publish_delivered.load(Ordering::Relaxed),
                "failed": self.publish_failed.load(Ordering::Relaxed),
                "short_circuited": self.publish_short_circuited.load(Ordering::Relaxed),
            },
            "circuit_breaker": {
                "transitions": self.breaker_transitions.load(Ordering::Relaxed),
                "state": self.breaker_state.load(Ordering::Relaxed),
            },
            "latency": {
                "storage_average_ms": self.average_storage_latency_ms(),
                "bus_average_ms": self.average_bus_latency_ms(),
            }
        })
    }
}

/// Request timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<GatewayMetrics>,
}

impl RequestTimer {
    pub fn start(metrics: Arc<GatewayMetrics>) -> Self {
        metrics.http_requests_in_flight.fetch_add(1, Ordering::Relaxed);
        Self {
            start: Instant::now(),
            metrics,
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.metrics
            .http_requests_in_flight
            .fetch_sub(1, Ordering::Relaxed);
        self.metrics.http_requests_total.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .http_latency_us_total
            .fetch_add(self.start.elapsed().as_micros() as u64, Ordering::Relaxed);
    }
}

/// Layer counting requests and in-flight load
#[derive(Clone)]
pub struct MetricsLayer {
    metrics: Arc<GatewayMetrics>,
}

impl MetricsLayer {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for MetricsService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let timer = RequestTimer::start(Arc::clone(&self.metrics));
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let result = inner.call(req).await;
            drop(timer);
            result
        })
    }
}
