//! Provider webhook authentication.
//!
//! Validation runs over the buffered raw body, before JSON parsing, and
//! never consumes it. An empty configured secret disables validation for
//! that provider.

use crate::domain::config::AuthConfig;
use crate::domain::error::IngestError;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use ticket_types::Provider;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Freshdesk body signature.
pub const FRESHDESK_SIGNATURE_HEADER: &str = "x-freshdesk-signature";

/// How a provider proves a webhook is genuine.
#[derive(Clone)]
pub enum SignatureScheme {
    /// Hex HMAC-SHA256 of the raw body in `X-Freshdesk-Signature`.
    HmacSha256 { secret: String },
    /// `Authorization: Basic base64(user:password)`.
    BasicCredential { secret: String },
}

impl SignatureScheme {
    fn secret(&self) -> &str {
        match self {
            SignatureScheme::HmacSha256 { secret } | SignatureScheme::BasicCredential { secret } => {
                secret
            }
        }
    }
}

impl std::fmt::Debug for SignatureScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SignatureScheme::HmacSha256 { .. } => "HmacSha256",
            SignatureScheme::BasicCredential { .. } => "BasicCredential",
        };
        f.debug_struct(name)
            .field("enforced", &!self.secret().is_empty())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SignatureValidator {
    provider: Provider,
    scheme: SignatureScheme,
}

impl SignatureValidator {
    pub fn new(provider: Provider, scheme: SignatureScheme) -> Self {
        Self { provider, scheme }
    }

    /// The scheme each provider uses, keyed by its configured secret.
    pub fn for_provider(provider: Provider, config: &AuthConfig) -> Self {
        let secret = config.secret_for(provider).to_string();
        let scheme = match provider {
            Provider::Freshdesk => SignatureScheme::HmacSha256 { secret },
            Provider::Zendesk => SignatureScheme::BasicCredential { secret },
        };
        Self::new(provider, scheme)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// False when the secret is empty and every request is accepted.
    pub fn is_enforced(&self) -> bool {
        !self.scheme.secret().is_empty()
    }

    pub fn validate(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), IngestError> {
        if !self.is_enforced() {
            return Ok(());
        }

        match &self.scheme {
            SignatureScheme::HmacSha256 { secret } => {
                let provided = header_str(headers, FRESHDESK_SIGNATURE_HEADER).ok_or_else(|| {
                    IngestError::Authentication("Missing X-Freshdesk-Signature header".into())
                })?;

                if !constant_time_compare(provided, &sign_hmac(secret, body)) {
                    debug!(provider = %self.provider, "Signature mismatch");
                    return Err(IngestError::Authentication("Invalid signature".into()));
                }
            }
            SignatureScheme::BasicCredential { secret } => {
                let provided = header_str(headers, axum::http::header::AUTHORIZATION.as_str())
                    .ok_or_else(|| IngestError::Authentication("Missing Authorization header".into()))?;

                if !constant_time_compare(provided, &basic_header(secret)) {
                    debug!(provider = %self.provider, "Credential mismatch");
                    return Err(IngestError::Authentication("Invalid credentials".into()));
                }
            }
        }

        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Lowercase hex HMAC-SHA256 of `body`.
pub fn sign_hmac(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// `Basic <base64(secret)>`.
pub fn basic_header(secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(secret.as_bytes()))
}

/// Constant-time string comparison to prevent timing attacks
///
/// Unequal lengths are padded with different bytes so the content check
/// still runs over the full width.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
