//! # Bus Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    /// The ticket could not be encoded for the wire.
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    /// The bus is not accepting messages.
    #[error("bus unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("publish timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Backend connection or command failure.
    #[error("bus backend error: {0}")]
    Backend(String),
}
