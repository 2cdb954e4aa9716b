//! # Outbound Ports (Driven Ports)
//!
//! The persistence interface the ingestion pipeline requires.
//!
//! Production: `RocksDbTicketStore` (feature `rocksdb`)
//! Testing / development: `InMemoryTicketStore`

use async_trait::async_trait;
use ticket_types::{CanonicalTicket, NaturalKey};
use uuid::Uuid;

use crate::errors::StoreError;

/// Uniqueness-enforcing ticket store.
///
/// ## Uniqueness Guarantee
///
/// `insert` must fail with [`StoreError::UniqueViolation`] when a ticket with
/// the same natural key already exists, even when two inserts race. Callers
/// treat that error as "someone else won" and re-read.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Look up a ticket by its provider-assigned identity.
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<CanonicalTicket>, StoreError>;

    /// Look up a ticket by its internal id.
    async fn get(&self, id: Uuid) -> Result<Option<CanonicalTicket>, StoreError>;

    /// Persist a new ticket.
    async fn insert(&self, ticket: &CanonicalTicket) -> Result<(), StoreError>;

    /// Number of stored tickets.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Short backend name for logs.
    fn kind(&self) -> &'static str;
}
