//! Exactly-once persistence keyed on `(external_source, external_id)`.
//!
//! Look up first; create only when absent. The store's uniqueness
//! constraint settles concurrent first deliveries: the loser gets a
//! `UniqueViolation`, re-reads the winner and reports it as already
//! existing.

use std::sync::Arc;
use std::time::Instant;

use ticket_storage::{StoreError, TicketStore};
use ticket_types::CanonicalTicket;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::error::IngestError;
use crate::middleware::metrics::GatewayMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// This call created the ticket.
    Created(Uuid),
    /// A ticket with the same natural key was already stored.
    AlreadyExists(Uuid),
}

impl IngestOutcome {
    pub fn ticket_id(&self) -> Uuid {
        match self {
            IngestOutcome::Created(id) | IngestOutcome::AlreadyExists(id) => *id,
        }
    }
}

pub struct IdempotencyGuard {
    store: Arc<dyn TicketStore>,
    metrics: Arc<GatewayMetrics>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn TicketStore>, metrics: Arc<GatewayMetrics>) -> Self {
        Self { store, metrics }
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    pub async fn ingest(&self, ticket: &CanonicalTicket) -> Result<IngestOutcome, IngestError> {
        let key = ticket.natural_key();

        let started = Instant::now();
        let existing = self.store.find_by_natural_key(&key).await;
        self.metrics.record_storage_latency(started.elapsed());

        match existing {
            Ok(Some(found)) => {
                debug!(key = %key, ticket_id = %found.id, "Ticket already processed");
                return Ok(IngestOutcome::AlreadyExists(found.id));
            }
            Ok(None) => {}
            Err(e) => {
                error!(key = %key, error = %e, "Natural key lookup failed");
                return Err(IngestError::Storage(e));
            }
        }

        let started = Instant::now();
        let inserted = self.store.insert(ticket).await;
        self.metrics.record_storage_latency(started.elapsed());

        match inserted {
            Ok(()) => {
                info!(key = %key, ticket_id = %ticket.id, "Ticket created");
                Ok(IngestOutcome::Created(ticket.id))
            }
            Err(StoreError::UniqueViolation { .. }) => self.resolve_race(ticket).await,
            Err(e) => {
                error!(key = %key, error = %e, "Ticket insert failed");
                Err(IngestError::Storage(e))
            }
        }
    }

    /// Another request created the ticket between our lookup and insert.
    async fn resolve_race(&self, ticket: &CanonicalTicket) -> Result<IngestOutcome, IngestError> {
        let key = ticket.natural_key();

        let started = Instant::now();
        let winner = self.store.find_by_natural_key(&key).await;
        self.metrics.record_storage_latency(started.elapsed());

        match winner {
            Ok(Some(found)) => {
                debug!(key = %key, ticket_id = %found.id, "Lost create race, returning winner");
                Ok(IngestOutcome::AlreadyExists(found.id))
            }
            Ok(None) => {
                error!(key = %key, "Unique violation reported but no ticket found");
                Err(IngestError::Storage(StoreError::UniqueViolation { key }))
            }
            Err(e) => {
                error!(key = %key, error = %e, "Re-read after unique violation failed");
                Err(IngestError::Storage(e))
            }
        }
    }
}
