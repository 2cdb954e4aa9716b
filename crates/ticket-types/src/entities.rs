//! # Core Domain Entities
//!
//! The canonical ticket shape every provider payload is normalized into.
//!
//! ## Identity
//!
//! - `id`: generated at normalization time, unique per record
//! - `(external_source, external_id)`: the provider-assigned natural key used
//!   for deduplication. At most one ticket exists per natural key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::UnknownProvider;

/// Raw, unmodelled provider attributes stored alongside the ticket.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// PROVIDERS
// =============================================================================

/// External helpdesk systems that deliver webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Flat payloads, HMAC-signed bodies.
    Freshdesk,
    /// Optionally nested payloads, HTTP Basic credentials.
    Zendesk,
}

impl Provider {
    /// All supported providers.
    pub const ALL: [Provider; 2] = [Provider::Freshdesk, Provider::Zendesk];

    /// Value stored in `external_source`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Freshdesk => "freshdesk",
            Provider::Zendesk => "zendesk",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freshdesk" => Ok(Provider::Freshdesk),
            "zendesk" => Ok(Provider::Zendesk),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

// =============================================================================
// PRIORITY
// =============================================================================

/// Ticket priority.
///
/// Providers occasionally send priority names outside the four canonical
/// levels; those are kept verbatim in [`Priority::Other`] so the stored value
/// matches what the provider sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
    /// Provider-supplied string that is not one of the canonical names.
    Other(String),
}

impl Priority {
    /// Map a numeric provider code (`1..=4`) to a canonical level.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Priority::Low),
            2 => Some(Priority::Medium),
            3 => Some(Priority::High),
            4 => Some(Priority::Urgent),
            _ => None,
        }
    }

    /// Interpret a provider string without altering it.
    ///
    /// Only the exact lowercase canonical names map to the named variants.
    pub fn verbatim(value: &str) -> Self {
        match value {
            "low" => Priority::Low,
            "medium" => Priority::Medium,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            other => Priority::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
            Priority::Other(value) => value,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Priority::verbatim(&value))
    }
}

// =============================================================================
// NATURAL KEY
// =============================================================================

/// Provider-assigned identity of an external event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub external_source: String,
    pub external_id: String,
}

impl NaturalKey {
    pub fn new(external_source: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            external_source: external_source.into(),
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.external_source, self.external_id)
    }
}

// =============================================================================
// CANONICAL TICKET
// =============================================================================

/// Status assigned when a provider does not supply one.
pub const DEFAULT_STATUS: &str = "open";

/// The unified representation of a support ticket.
///
/// Created once at first successful ingestion of an external event. The
/// enrichment, SLA and lifecycle timestamps are owned by later stages and
/// stay at their defaults here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTicket {
    pub id: Uuid,
    pub external_id: String,
    pub external_source: String,

    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: Priority,

    // Enrichment (populated downstream)
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub urgency_score: f64,

    /// Raw provider payload, verbatim.
    #[serde(default)]
    pub entities: Attributes,

    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: String,

    pub sla_due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sla_breached: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl CanonicalTicket {
    /// A fresh ticket for the given natural key with a new id, current
    /// timestamps and every content field at its default.
    pub fn new(external_source: impl Into<String>, external_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            external_source: external_source.into(),
            title: String::new(),
            description: String::new(),
            status: DEFAULT_STATUS.to_string(),
            priority: Priority::default(),
            category: String::new(),
            subcategory: String::new(),
            intent: String::new(),
            sentiment: String::new(),
            urgency_score: 0.0,
            entities: Attributes::new(),
            customer_id: None,
            customer_email: String::new(),
            customer_name: String::new(),
            sla_due_at: None,
            sla_breached: false,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
            closed_at: None,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.external_source.clone(), self.external_id.clone())
    }

    /// Append a tag, keeping first-seen order and skipping duplicates.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}
