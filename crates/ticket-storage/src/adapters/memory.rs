//! # In-Memory Ticket Store
//!
//! Both indexes live under a single lock so the natural-key check and the
//! write are one atomic step.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use ticket_types::{CanonicalTicket, NaturalKey};
use tracing::debug;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::ports::TicketStore;

#[derive(Default)]
struct Tables {
    tickets: HashMap<Uuid, CanonicalTicket>,
    natural_keys: HashMap<NaturalKey, Uuid>,
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct InMemoryTicketStore {
    tables: RwLock<Tables>,
    operations: AtomicU64,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total operations served since construction.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    fn record(&self, op: &'static str, started: Instant) {
        let total = self.operations.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            store = "memory",
            op,
            total_ops = total,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Store operation"
        );
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<CanonicalTicket>, StoreError> {
        let started = Instant::now();
        let found = {
            let tables = self.tables.read();
            tables
                .natural_keys
                .get(key)
                .and_then(|id| tables.tickets.get(id))
                .cloned()
        };
        self.record("find_by_natural_key", started);
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CanonicalTicket>, StoreError> {
        let started = Instant::now();
        let found = self.tables.read().tickets.get(&id).cloned();
        self.record("get", started);
        Ok(found)
    }

    async fn insert(&self, ticket: &CanonicalTicket) -> Result<(), StoreError> {
        let started = Instant::now();
        let key = ticket.natural_key();
        let result = {
            let mut tables = self.tables.write();
            if tables.natural_keys.contains_key(&key) {
                Err(StoreError::UniqueViolation { key })
            } else {
                tables.natural_keys.insert(key, ticket.id);
                tables.tickets.insert(ticket.id, ticket.clone());
                Ok(())
            }
        };
        self.record("insert", started);
        result
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().tickets.len())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
