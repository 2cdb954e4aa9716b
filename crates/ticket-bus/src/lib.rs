//! # Ticket Bus - Notification of Newly Ingested Tickets
//!
//! Downstream consumers (enrichment, routing, SLA tracking) learn about new
//! tickets from the `tickets:new` channel. Delivery is best-effort: a publish
//! failure is reported to the caller and never retried here.
//!
//! ```text
//! ┌──────────────┐   send("tickets:new")   ┌──────────────┐
//! │  Ingestion   │ ──────────────────────► │  Ticket Bus  │ ──► consumers
//! └──────────────┘                         └──────────────┘
//! ```
//!
//! ## Adapters
//!
//! - [`InMemoryTicketBus`]: `tokio::sync::broadcast`, single process
//! - `RedisTicketBus`: Redis `PUBLISH` (feature `redis`)

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod errors;
pub mod publisher;
#[cfg(feature = "redis")]
pub mod redis_bus;

pub use errors::BusError;
pub use publisher::{InMemoryTicketBus, Notification, NotificationPublisher};
#[cfg(feature = "redis")]
pub use redis_bus::{RedisBusConfig, RedisTicketBus};

/// Channel on which newly created tickets are announced.
pub const TICKETS_NEW_CHANNEL: &str = "tickets:new";

/// Maximum notifications to buffer per in-process subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
