//! # Ticket Storage
//!
//! Persistence for canonical tickets behind the [`TicketStore`] port.
//!
//! ## Adapters
//!
//! | Adapter | URL | Notes |
//! |---------|-----|-------|
//! | [`InMemoryTicketStore`] | `memory://` | development and tests |
//! | `RocksDbTicketStore` | `rocksdb://<path>` | feature `rocksdb`, fsync on write |
//!
//! Every adapter enforces uniqueness of `(external_source, external_id)`.

pub mod adapters;
pub mod errors;
pub mod ports;

pub use adapters::memory::InMemoryTicketStore;
#[cfg(feature = "rocksdb")]
pub use adapters::rocksdb::{RocksDbConfig, RocksDbTicketStore};
pub use errors::StoreError;
pub use ports::TicketStore;
