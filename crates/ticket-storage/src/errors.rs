//! # Storage Errors
//!
//! - `UniqueViolation` is the signal the idempotency guard relies on; adapters
//!   must return it (and nothing else) when a natural key is already taken.
//! - Everything else is opaque to callers and surfaces as a storage failure.

use thiserror::Error;
use ticket_types::NaturalKey;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A ticket with this natural key already exists.
    #[error("ticket already exists for {key}")]
    UniqueViolation { key: NaturalKey },

    /// Backend I/O or driver failure.
    #[error("database error: {message}")]
    Database { message: String },

    /// Stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking worker running a backend call was lost.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn database(message: impl Into<String>) -> Self {
        StoreError::Database {
            message: message.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}
