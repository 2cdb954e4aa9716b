//! Domain types for the ingestion gateway: configuration, errors and
//! payload normalization.

pub mod config;
pub mod error;
pub mod json;
pub mod normalizer;

pub use config::{GatewayConfig, RateLimitConfig};
pub use error::{GatewayError, IngestError};
pub use normalizer::{normalizer_for, NormalizeError, PayloadNormalizer};
