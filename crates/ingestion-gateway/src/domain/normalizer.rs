//! # Payload Normalization
//!
//! Maps raw provider JSON onto [`CanonicalTicket`]. Normalizers are pure: they
//! read the payload through the accessors in [`crate::domain::json`] and never
//! panic, whatever the input shape.
//!
//! ## Freshdesk
//!
//! Flat object. `subject` / `description` with `ticket_subject` /
//! `ticket_description` as fallbacks, numeric priority codes `1..=4`,
//! customer from `email` / `name`. Status is always `open`.
//!
//! ## Zendesk
//!
//! Fields live under `ticket` when present, otherwise at the root. Customer
//! comes from the nested `requester` object. Status and priority strings are
//! copied as sent. The whole outer payload is kept in `entities`.

use serde_json::{Map, Value};
use ticket_types::{CanonicalTicket, Priority, Provider, DEFAULT_STATUS};

use crate::domain::json::{integral, non_empty_string, optional_object, optional_string, stringify_any};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The payload carries no usable `id`.
    #[error("missing external id")]
    MissingExternalId { provider: Provider },
}

/// Provider-specific mapping into the canonical record.
pub trait PayloadNormalizer: Send + Sync {
    fn provider(&self) -> Provider;

    fn normalize(&self, payload: &Map<String, Value>) -> Result<CanonicalTicket, NormalizeError>;
}

/// The normalizer for `provider`.
pub fn normalizer_for(provider: Provider) -> &'static dyn PayloadNormalizer {
    match provider {
        Provider::Freshdesk => &FreshdeskNormalizer,
        Provider::Zendesk => &ZendeskNormalizer,
    }
}

fn external_id(
    provider: Provider,
    data: &Map<String, Value>,
) -> Result<String, NormalizeError> {
    let id = stringify_any(data.get("id"));
    if id.is_empty() {
        return Err(NormalizeError::MissingExternalId { provider });
    }
    Ok(id)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FreshdeskNormalizer;

impl FreshdeskNormalizer {
    /// `1..=4` map to levels, strings pass through, anything else is medium.
    pub fn priority(value: Option<&Value>) -> Priority {
        match value {
            Some(Value::String(s)) => Priority::verbatim(s),
            Some(number @ Value::Number(_)) => integral(number)
                .and_then(Priority::from_code)
                .unwrap_or_default(),
            _ => Priority::default(),
        }
    }
}

impl PayloadNormalizer for FreshdeskNormalizer {
    fn provider(&self) -> Provider {
        Provider::Freshdesk
    }

    fn normalize(&self, payload: &Map<String, Value>) -> Result<CanonicalTicket, NormalizeError> {
        let mut ticket =
            CanonicalTicket::new(Provider::Freshdesk.as_str(), external_id(self.provider(), payload)?);

        ticket.title = non_empty_string(payload, "subject")
            .or_else(|| optional_string(payload, "ticket_subject"))
            .unwrap_or_default()
            .to_string();
        ticket.description = non_empty_string(payload, "description")
            .or_else(|| optional_string(payload, "ticket_description"))
            .unwrap_or_default()
            .to_string();
        ticket.status = DEFAULT_STATUS.to_string();
        ticket.priority = Self::priority(payload.get("priority"));
        ticket.customer_email = optional_string(payload, "email").unwrap_or_default().to_string();
        ticket.customer_name = optional_string(payload, "name").unwrap_or_default().to_string();
        ticket.entities = payload.clone();

        Ok(ticket)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZendeskNormalizer;

impl PayloadNormalizer for ZendeskNormalizer {
    fn provider(&self) -> Provider {
        Provider::Zendesk
    }

    fn normalize(&self, payload: &Map<String, Value>) -> Result<CanonicalTicket, NormalizeError> {
        let data = optional_object(payload, "ticket").unwrap_or(payload);
        let mut ticket =
            CanonicalTicket::new(Provider::Zendesk.as_str(), external_id(self.provider(), data)?);

        ticket.title = optional_string(data, "subject").unwrap_or_default().to_string();
        ticket.description = optional_string(data, "description").unwrap_or_default().to_string();
        ticket.status = optional_string(data, "status").unwrap_or_default().to_string();
        // Copied as sent, even when empty; only a missing field takes the default
        ticket.priority = optional_string(data, "priority")
            .map(Priority::verbatim)
            .unwrap_or_default();

        if let Some(requester) = optional_object(data, "requester") {
            if let Some(name) = optional_string(requester, "name") {
                ticket.customer_name = name.to_string();
            }
            if let Some(email) = optional_string(requester, "email") {
                ticket.customer_email = email.to_string();
            }
        }

        ticket.entities = payload.clone();
        Ok(ticket)
    }
}
