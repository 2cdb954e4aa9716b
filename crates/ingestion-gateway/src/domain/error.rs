//! Ingestion error taxonomy and its HTTP mapping.
//!
//! | Variant | Status |
//! |---------|--------|
//! | `Authentication` | 401 |
//! | `MalformedPayload` | 400 |
//! | `RateLimited` | 429 + `Retry-After` |
//! | `PayloadTooLarge` | 413 |
//! | `Storage` | 500, generic message |
//!
//! Notification failures are not errors; they surface as a 202 response.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use ticket_storage::StoreError;

/// Message returned for every storage failure. Backend details stay in logs.
pub const STORAGE_FAILURE_MESSAGE: &str = "Failed to save ticket";

/// Message returned on rate limit rejection.
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Request failed provider authentication.
    #[error("{0}")]
    Authentication(String),

    /// Body is not a usable provider payload.
    #[error("{0}")]
    MalformedPayload(String),

    /// Client exhausted its token bucket.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Body exceeds the configured cap.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Lookup or create failed for a reason other than a lost race.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl IngestError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        IngestError::MalformedPayload(reason.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Authentication(_) => StatusCode::UNAUTHORIZED,
            IngestError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            IngestError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            IngestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `error` field of the response body.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::Storage(_) => STORAGE_FAILURE_MESSAGE.to_string(),
            IngestError::RateLimited { .. } => RATE_LIMITED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Whole seconds until a retry can succeed, never zero.
pub fn retry_after_secs(retry_after_ms: u64) -> u64 {
    retry_after_ms.div_ceil(1000).max(1)
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({ "error": self.public_message() });
        let mut response = (status, Json(body)).into_response();

        if let IngestError::RateLimited { retry_after_ms } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs(retry_after_ms).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Gateway-level errors (startup and serving, not per-request)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::domain::config::ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server terminated abnormally
    #[error("server error: {0}")]
    Serve(String),
}
