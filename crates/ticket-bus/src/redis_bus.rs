//! # Redis Ticket Bus
//!
//! Publishes each ticket as JSON with `PUBLISH <channel> <payload>` over a
//! multiplexed connection. The connection is verified with `PING` at connect
//! time so a misconfigured URL fails at startup instead of on the first
//! ticket.

use crate::errors::BusError;
use crate::publisher::NotificationPublisher;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use ticket_types::CanonicalTicket;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RedisBusConfig {
    /// `redis://` or `rediss://` URL
    pub url: String,
    /// Upper bound for one `PUBLISH` round trip
    pub publish_timeout: Duration,
}

impl RedisBusConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            publish_timeout: Duration::from_secs(2),
        }
    }
}

pub struct RedisTicketBus {
    connection: MultiplexedConnection,
    publish_timeout: Duration,
    messages_published: AtomicU64,
}

impl RedisTicketBus {
    /// Open the client, establish a multiplexed connection and `PING` it.
    pub async fn connect(config: RedisBusConfig) -> Result<Self, BusError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| BusError::Backend(format!("invalid redis url: {}", e)))?;
        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Backend(format!("failed to connect to redis: {}", e)))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| BusError::Backend(format!("redis PING failed: {}", e)))?;
        info!(reply = %pong, "Connected to Redis");

        Ok(Self {
            connection,
            publish_timeout: config.publish_timeout,
            messages_published: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl NotificationPublisher for RedisTicketBus {
    async fn send(&self, channel: &str, ticket: &CanonicalTicket) -> Result<usize, BusError> {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_string(ticket)?;

        let mut connection = self.connection.clone();
        let publish = connection.publish::<_, _, i64>(channel, payload);
        let receivers = tokio::time::timeout(self.publish_timeout, publish)
            .await
            .map_err(|_| BusError::Timeout {
                millis: self.publish_timeout.as_millis() as u64,
            })?
            .map_err(|e| BusError::Backend(e.to_string()))?;

        debug!(channel, ticket_id = %ticket.id, receivers, "Notification published");
        Ok(receivers.max(0) as usize)
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}
