//! # Ticket Types Crate
//!
//! The canonical ticket record shared by every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: storage, the notification bus and the gateway
//!   all exchange [`CanonicalTicket`]; none of them define their own shape.
//! - **Natural Key**: `(external_source, external_id)` identifies the external
//!   event and is the only deduplication key.
//! - **Forward Compatibility**: the raw provider payload travels with the
//!   record in `entities` so unmodelled fields are never lost.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
