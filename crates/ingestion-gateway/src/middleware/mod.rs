//! Middleware for the ingestion gateway.
//!
//! Layer order: Request → Tracing → Metrics → RateLimit (webhook routes only) → Handler
//!
//! Authentication and the circuit breaker are not tower layers: signature
//! checks need the buffered body, and the breaker guards the notification
//! call inside the pipeline rather than the request itself.

pub mod auth;
pub mod circuit_breaker;
pub mod metrics;
pub mod rate_limit;
pub mod tracing;

pub use auth::{constant_time_compare, SignatureScheme, SignatureValidator};
pub use circuit_breaker::{
    CallError, CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStats,
    Rejection,
};
pub use metrics::{GatewayMetrics, MetricsLayer, RequestTimer};
pub use rate_limit::{RateLimitLayer, RateLimitState, TokenBucket};
pub use tracing::TracingLayer;
