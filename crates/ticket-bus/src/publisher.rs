//! # Notification Publisher
//!
//! The publishing side of the ticket bus.

use crate::errors::BusError;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use ticket_types::CanonicalTicket;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for announcing tickets to downstream consumers.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish the ticket as JSON on `channel`.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the message.
    async fn send(&self, channel: &str, ticket: &CanonicalTicket) -> Result<usize, BusError>;

    /// Total publish attempts.
    fn messages_published(&self) -> u64;

    /// Short backend name for logs.
    fn kind(&self) -> &'static str;
}

/// A message as seen by in-process subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: String,
    /// JSON-encoded [`CanonicalTicket`], identical to what Redis carries.
    pub payload: String,
}

impl Notification {
    pub fn ticket(&self) -> Result<CanonicalTicket, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// In-memory implementation of the ticket bus.
///
/// Uses `tokio::sync::broadcast`; a message with no subscribers is dropped
/// and reported as zero receivers, the same as Redis `PUBLISH`.
pub struct InMemoryTicketBus {
    sender: broadcast::Sender<Notification>,
    messages_published: AtomicU64,
    available: AtomicBool,
    capacity: usize,
}

impl InMemoryTicketBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            messages_published: AtomicU64::new(0),
            available: AtomicBool::new(true),
            capacity,
        }
    }

    /// Receive every notification published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Simulate an outage: while unavailable every `send` fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for InMemoryTicketBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryTicketBus {
    async fn send(&self, channel: &str, ticket: &CanonicalTicket) -> Result<usize, BusError> {
        // Counted even when the send fails
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        if !self.available.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("in-memory bus disabled".into()));
        }

        let notification = Notification {
            channel: channel.to_string(),
            payload: serde_json::to_string(ticket)?,
        };

        match self.sender.send(notification) {
            Ok(receivers) => {
                debug!(
                    channel,
                    ticket_id = %ticket.id,
                    receivers,
                    "Notification published"
                );
                Ok(receivers)
            }
            Err(_) => {
                warn!(
                    channel,
                    ticket_id = %ticket.id,
                    "Notification dropped (no subscribers)"
                );
                Ok(0)
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
