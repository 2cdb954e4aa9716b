//! Circuit breaker guarding the notification bus.
//!
//! # Circuit Breaker States
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    CIRCUIT BREAKER STATE MACHINE                    │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │      ┌──────────┐          ┌──────────┐          ┌──────────┐       │
//! │      │  CLOSED  │ ───────► │   OPEN   │ ───────► │HALF-OPEN │       │
//! │      │ (normal) │ failures │ (reject) │  timeout │ (trial)  │       │
//! │      └──────────┘          └──────────┘          └──────────┘       │
//! │            ▲                     ▲   trial failure     │            │
//! │            │                     └─────────────────────┤            │
//! │            └───────────────────────────────────────────┘            │
//! │                           trial success                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Configuration
//!
//! - `failure_threshold`: consecutive failures before opening (default: 5)
//! - `open_timeout`: time before a trial call is admitted (default: 30s)
//! - `half_open_max_calls`: concurrent trial calls while half-open (default: 1)
//!
//! The Open→HalfOpen move happens lazily, on the first call after the
//! timeout. Outcomes are attributed through a [`CallPermit`] carrying the
//! generation it was issued in; a result from an earlier generation updates
//! totals but never drives a transition. A permit dropped without an outcome
//! (the caller's future was cancelled) hands its half-open slot back.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::middleware::metrics::GatewayMetrics;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Calls are rejected immediately
    Open,
    /// Admitting a bounded number of trial calls
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 = closed, 1 = open, 2 = half-open.
    pub fn gauge_value(&self) -> u64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration before half-open from open state
    pub open_timeout: Duration,
    /// Trial calls admitted concurrently while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

/// Admission ticket for one guarded call.
///
/// Settle it with [`CircuitBreaker::record_success`] or
/// [`CircuitBreaker::record_failure`]; dropping it unsettled releases the
/// half-open slot it holds without counting an outcome.
#[must_use = "an unsettled permit records no outcome"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn settle(mut self) -> u64 {
        self.settled = true;
        self.generation
    }
}

impl fmt::Debug for CallPermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.name)
            .field("generation", &self.generation)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.abandon(self.generation);
        }
    }
}

/// Why a call was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("circuit breaker is open")]
    Open,
    #[error("circuit breaker is half-open, trial call in progress")]
    HalfOpenSaturated,
}

/// Result of [`CircuitBreaker::call`].
#[derive(Debug)]
pub enum CallError<E> {
    /// The breaker refused the call.
    Rejected(Rejection),
    /// The call ran and failed.
    Failed(E),
}

struct BreakerCore {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_in_flight: u32,
    opened_at: Option<Instant>,
    last_transition: Instant,
    generation: u64,
}

/// Three-state circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    core: Mutex<BreakerCore>,
    state_tx: watch::Sender<CircuitState>,
    metrics: Arc<GatewayMetrics>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        let (state_tx, _) = watch::channel(CircuitState::Closed);
        Self {
            name: name.into(),
            config,
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_in_flight: 0,
                opened_at: None,
                last_transition: Instant::now(),
                generation: 0,
            }),
            state_tx,
            metrics,
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state as last transitioned. An expired Open stays Open until
    /// the next call.
    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    /// Watch every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<CircuitState> {
        self.state_tx.subscribe()
    }

    /// Ask to make a call.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, Rejection> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Result<CallPermit<'_>, Rejection> {
        let mut core = self.core.lock();

        if core.state == CircuitState::Open {
            let opened_at = core.opened_at.unwrap_or(core.last_transition);
            if now.saturating_duration_since(opened_at) >= self.config.open_timeout {
                self.transition(&mut core, CircuitState::HalfOpen, now);
            } else {
                drop(core);
                self.total_rejections.fetch_add(1, Ordering::Relaxed);
                debug!(
                    breaker = %self.name,
                    remaining_ms = self
                        .config
                        .open_timeout
                        .saturating_sub(now.saturating_duration_since(opened_at))
                        .as_millis() as u64,
                    "Circuit breaker is open, rejecting call"
                );
                return Err(Rejection::Open);
            }
        }

        if core.state == CircuitState::HalfOpen {
            if core.half_open_in_flight >= self.config.half_open_max_calls {
                drop(core);
                self.total_rejections.fetch_add(1, Ordering::Relaxed);
                return Err(Rejection::HalfOpenSaturated);
            }
            core.half_open_in_flight += 1;
        }

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        Ok(CallPermit {
            breaker: self,
            generation: core.generation,
            settled: false,
        })
    }

    /// A permit went away unsettled: free its half-open slot.
    fn abandon(&self, generation: u64) {
        let mut core = self.core.lock();
        if generation != core.generation || core.state != CircuitState::HalfOpen {
            return;
        }
        core.half_open_in_flight = core.half_open_in_flight.saturating_sub(1);
        debug!(breaker = %self.name, "Half-open trial abandoned, slot released");
    }

    /// Record that the permitted call succeeded.
    pub fn record_success(&self, permit: CallPermit<'_>) {
        self.record_success_at(permit, Instant::now());
    }

    pub fn record_success_at(&self, permit: CallPermit<'_>, now: Instant) {
        let generation = permit.settle();
        let mut core = self.core.lock();
        if generation != core.generation {
            return;
        }

        match core.state {
            CircuitState::Closed => {
                core.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                info!(breaker = %self.name, "Circuit breaker closing after successful trial");
                self.transition(&mut core, CircuitState::Closed, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Record that the permitted call failed.
    pub fn record_failure(&self, permit: CallPermit<'_>) {
        self.record_failure_at(permit, Instant::now());
    }

    pub fn record_failure_at(&self, permit: CallPermit<'_>, now: Instant) {
        let generation = permit.settle();
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let mut core = self.core.lock();
        if generation != core.generation {
            return;
        }

        match core.state {
            CircuitState::Closed => {
                core.consecutive_failures += 1;
                if core.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = core.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        timeout_secs = self.config.open_timeout.as_secs(),
                        "Circuit breaker opening due to failures"
                    );
                    self.transition(&mut core, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "Circuit breaker reopening after trial failure");
                self.transition(&mut core, CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Run `f` behind the breaker.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire().map_err(CallError::Rejected)?;
        match f().await {
            Ok(value) => {
                self.record_success(permit);
                Ok(value)
            }
            Err(e) => {
                self.record_failure(permit);
                Err(CallError::Failed(e))
            }
        }
    }

    /// Force the breaker closed.
    pub fn reset(&self) {
        let mut core = self.core.lock();
        if core.state != CircuitState::Closed {
            info!(breaker = %self.name, "Circuit breaker manually reset");
            self.transition(&mut core, CircuitState::Closed, Instant::now());
        } else {
            core.consecutive_failures = 0;
        }
    }

    fn transition(&self, core: &mut BreakerCore, to: CircuitState, now: Instant) {
        let from = core.state;
        core.state = to;
        core.generation += 1;
        core.consecutive_failures = 0;
        core.half_open_in_flight = 0;
        core.opened_at = (to == CircuitState::Open).then_some(now);
        core.last_transition = now;

        info!(breaker = %self.name, from = %from, to = %to, "Circuit breaker transition");
        self.metrics.record_breaker_transition(to);
        self.state_tx.send_replace(to);
    }

    /// Snapshot for the metrics endpoint.
    pub fn stats(&self) -> CircuitStats {
        let core = self.core.lock();
        CircuitStats {
            name: self.name.clone(),
            state: core.state,
            consecutive_failures: core.consecutive_failures,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
            time_in_state_ms: core.last_transition.elapsed().as_millis() as u64,
        }
    }
}

/// Statistics for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    pub time_in_state_ms: u64,
}

impl serde::Serialize for CircuitStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CircuitStats", 7)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("state", &self.state.to_string())?;
        state.serialize_field("consecutive_failures", &self.consecutive_failures)?;
        state.serialize_field("total_calls", &self.total_calls)?;
        state.serialize_field("total_failures", &self.total_failures)?;
        state.serialize_field("total_rejections", &self.total_rejections)?;
        state.serialize_field("time_in_state_ms", &self.time_in_state_ms)?;
        state.end()
    }
}
