//! # Shared Errors

use thiserror::Error;

/// A provider name that is not one of [`crate::Provider::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);
