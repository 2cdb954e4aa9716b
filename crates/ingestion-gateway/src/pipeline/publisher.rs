//! Best-effort notification behind the circuit breaker.
//!
//! [`BreakerPublisher::publish`] never fails. The outcome tells the pipeline
//! whether downstream consumers heard about the ticket; a persisted ticket
//! stays persisted either way.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use ticket_bus::NotificationPublisher;
use ticket_types::CanonicalTicket;
use tracing::{debug, warn};

use crate::middleware::circuit_breaker::{CircuitBreaker, Rejection};
use crate::middleware::metrics::GatewayMetrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered { receivers: usize },
    Failed { reason: String },
    /// The breaker refused the call; the bus was not contacted.
    ShortCircuited { rejection: Rejection },
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered { .. })
    }

    /// Reason reported in a degraded response.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            PublishOutcome::Delivered { .. } => None,
            PublishOutcome::Failed { reason } => Some(reason.clone()),
            PublishOutcome::ShortCircuited { rejection } => Some(rejection.to_string()),
        }
    }
}

pub struct BreakerPublisher {
    bus: Arc<dyn NotificationPublisher>,
    breaker: Arc<CircuitBreaker>,
    channel: String,
    metrics: Arc<GatewayMetrics>,
}

impl BreakerPublisher {
    pub fn new(
        bus: Arc<dyn NotificationPublisher>,
        breaker: Arc<CircuitBreaker>,
        channel: impl Into<String>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            bus,
            breaker,
            channel: channel.into(),
            metrics,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn bus(&self) -> &Arc<dyn NotificationPublisher> {
        &self.bus
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn publish(&self, ticket: &CanonicalTicket) -> PublishOutcome {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(rejection) => {
                self.metrics
                    .publish_short_circuited
                    .fetch_add(1, Ordering::Relaxed);
                warn!(
                    ticket_id = %ticket.id,
                    reason = %rejection,
                    "Publish short-circuited"
                );
                return PublishOutcome::ShortCircuited { rejection };
            }
        };

        // Cancellation past this point drops `permit`, which frees a
        // half-open slot without recording an outcome.
        let started = Instant::now();
        let sent = self.bus.send(&self.channel, ticket).await;
        self.metrics.record_bus_latency(started.elapsed());

        match sent {
            Ok(receivers) => {
                self.breaker.record_success(permit);
                self.metrics.publish_delivered.fetch_add(1, Ordering::Relaxed);
                debug!(ticket_id = %ticket.id, channel = %self.channel, receivers, "Ticket published");
                PublishOutcome::Delivered { receivers }
            }
            Err(e) => {
                self.breaker.record_failure(permit);
                self.metrics.publish_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    ticket_id = %ticket.id,
                    channel = %self.channel,
                    bus = self.bus.kind(),
                    error = %e,
                    "Publish failed"
                );
                PublishOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
