//! Per-client rate limiting with token buckets.
//!
//! A requests-per-minute budget becomes a steady refill of `budget / 60`
//! tokens per second and a burst of `max(budget / 10, 1)`. Buckets are
//! created full on first sight of a client key. The bucket table is bounded
//! by `max_clients`; admitting a new client into a full table evicts the
//! bucket seen least recently.
//!
//! Known clients only touch their own `DashMap` shard. New clients are
//! admitted under a single lock that also owns a recency index ordered by
//! last-seen time. The index is refreshed lazily: an entry is re-filed at the
//! bucket's real last-seen time when it reaches the front, so eviction costs
//! `O(log n)` amortized instead of a table scan.

use crate::domain::config::RateLimitConfig;
use crate::domain::error::IngestError;
use crate::middleware::metrics::GatewayMetrics;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Key used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Token bucket for a single client.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    rate: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub fn full(capacity: f64, rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            rate,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Add `elapsed * rate` tokens, capped at capacity.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Refill, then take one whole token if there is one.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.last_seen = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until one whole token is available, as of the last refill.
    pub fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        if self.rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// A bucket plus the time it is filed under in the recency index.
struct Slot {
    bucket: TokenBucket,
    indexed_at: Instant,
}

/// Rate limiter state shared across requests
pub struct RateLimitState {
    /// Per-client token buckets
    buckets: DashMap<String, Slot>,
    /// `(indexed_at, client)`, one entry per bucket. Guards admission.
    recency: Mutex<BTreeSet<(Instant, String)>>,
    config: RateLimitConfig,
    metrics: Arc<GatewayMetrics>,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            buckets: DashMap::new(),
            recency: Mutex::new(BTreeSet::new()),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or deny one request from `client_key`.
    pub fn allow(&self, client_key: &str) -> bool {
        self.check(client_key).is_ok()
    }

    /// Like [`allow`](Self::allow), reporting how long to wait on denial.
    pub fn check(&self, client_key: &str) -> Result<(), Duration> {
        self.check_at(client_key, Instant::now())
    }

    pub fn check_at(&self, client_key: &str, now: Instant) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }

        if let Some(mut slot) = self.buckets.get_mut(client_key) {
            return self.consume(&mut slot.bucket, now);
        }
        self.admit(client_key, now)
    }

    /// First sight of `client_key`: make room and insert, atomically with
    /// respect to other admissions.
    fn admit(&self, client_key: &str, now: Instant) -> Result<(), Duration> {
        let mut recency = self.recency.lock();

        // Admitted by a concurrent request while we waited
        if let Some(mut slot) = self.buckets.get_mut(client_key) {
            drop(recency);
            return self.consume(&mut slot.bucket, now);
        }

        self.make_room(&mut recency, client_key);

        debug!(client = %client_key, "Creating new rate limit bucket");
        let mut bucket = TokenBucket::full(
            self.config.burst_capacity(),
            self.config.refill_rate(),
            now,
        );
        let verdict = self.consume(&mut bucket, now);
        recency.insert((now, client_key.to_string()));
        self.buckets.insert(
            client_key.to_string(),
            Slot {
                bucket,
                indexed_at: now,
            },
        );
        verdict
    }

    fn consume(&self, bucket: &mut TokenBucket, now: Instant) -> Result<(), Duration> {
        if bucket.try_consume(now) {
            Ok(())
        } else {
            self.metrics.record_rate_limit_rejection();
            Err(bucket.time_until_available())
        }
    }

    /// Evict least-recently-seen buckets until a new one fits.
    fn make_room(&self, recency: &mut BTreeSet<(Instant, String)>, incoming: &str) {
        while self.buckets.len() >= self.config.max_clients {
            let Some((filed_at, key)) = recency.pop_first() else {
                return;
            };

            let refiled = match self.buckets.get_mut(&key) {
                // Entry outlived its bucket
                None => continue,
                Some(slot) if slot.indexed_at != filed_at => continue,
                Some(mut slot) if slot.bucket.last_seen > filed_at => {
                    slot.indexed_at = slot.bucket.last_seen;
                    Some(slot.indexed_at)
                }
                Some(_) => None,
            };

            match refiled {
                // Seen since it was filed: move it to its real place
                Some(last_seen) => {
                    recency.insert((last_seen, key));
                }
                None => {
                    if self.buckets.remove(&key).is_some() {
                        debug!(evicted = %key, incoming = %incoming, "Evicting least recently seen bucket");
                        self.metrics.record_rate_limit_eviction();
                    }
                }
            }
        }
    }

    /// Drop buckets not seen within `max_age`.
    pub fn evict_idle(&self, max_age: Duration) -> usize {
        self.evict_idle_at(max_age, Instant::now())
    }

    pub fn evict_idle_at(&self, max_age: Duration, now: Instant) -> usize {
        let mut recency = self.recency.lock();
        let before = self.buckets.len();
        self.buckets.retain(|client, slot| {
            let age = now.saturating_duration_since(slot.bucket.last_seen);
            if age > max_age {
                debug!(client = %client, age_secs = age.as_secs(), "Removing stale rate limit bucket");
                recency.remove(&(slot.indexed_at, client.clone()));
                false
            } else {
                true
            }
        });
        before.saturating_sub(self.buckets.len())
    }

    /// Get number of tracked clients
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Rate limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
}

impl RateLimitLayer {
    pub fn new(state: Arc<RateLimitState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Rate limit service
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0);
            let client = extract_client_key(req.headers(), peer);

            match state.check(&client) {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    let retry_after_ms = retry_after.as_millis().min(u64::MAX as u128) as u64;
                    warn!(
                        client = %client,
                        path = %req.uri().path(),
                        retry_after_ms,
                        "Rate limit exceeded"
                    );
                    Ok(IngestError::RateLimited { retry_after_ms }.into_response())
                }
            }
        })
    }
}

/// Client identity for rate limiting.
///
/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
pub fn extract_client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

/// Background task to clean up idle rate limit buckets
pub async fn cleanup_task(state: Arc<RateLimitState>, interval: Duration, max_age: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = state.evict_idle(max_age);
        if removed > 0 {
            debug!(removed, remaining = state.bucket_count(), "Rate limit cleanup");
        }
    }
}
