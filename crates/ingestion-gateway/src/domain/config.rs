//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use ticket_types::Provider;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Per-client admission control
    pub rate_limit: RateLimitConfig,
    /// Provider webhook secrets
    pub auth: AuthConfig,
    /// Breaker guarding the notification bus
    pub circuit_breaker: CircuitBreakerConfig,
    /// Request size limits
    pub limits: LimitsConfig,
    /// Notification settings
    pub notifications: NotificationConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "requests_per_minute cannot be 0".into(),
            ));
        }

        if self.rate_limit.max_clients == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "max_clients cannot be 0".into(),
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidCircuitBreaker(
                "failure_threshold cannot be 0".into(),
            ));
        }

        if self.circuit_breaker.open_timeout_secs == 0 {
            return Err(ConfigError::InvalidCircuitBreaker(
                "open_timeout_secs cannot be 0".into(),
            ));
        }

        if self.circuit_breaker.half_open_max_calls == 0 {
            return Err(ConfigError::InvalidCircuitBreaker(
                "half_open_max_calls cannot be 0".into(),
            ));
        }

        if self.limits.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit("max_body_bytes cannot be 0".into()));
        }

        if self.notifications.channel.is_empty() {
            return Err(ConfigError::Invalid("notification channel cannot be empty".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Per-client budget; steady rate is this over 60 seconds
    pub requests_per_minute: u32,
    /// Capacity of the bucket table
    pub max_clients: usize,
    /// How often idle buckets are swept
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
    /// Buckets unseen for this long are swept
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 100,
            max_clients: 10_000,
            cleanup_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl RateLimitConfig {
    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }

    /// Bucket capacity: a tenth of the minute budget, at least one.
    pub fn burst_capacity(&self) -> f64 {
        f64::from((self.requests_per_minute / 10).max(1))
    }
}

/// Webhook secrets per provider. An empty secret disables validation.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 key for `X-Freshdesk-Signature`
    #[serde(skip_serializing)]
    pub freshdesk_secret: String,
    /// `username:password` expected in the Zendesk `Authorization` header
    #[serde(skip_serializing)]
    pub zendesk_secret: String,
}

impl AuthConfig {
    pub fn secret_for(&self, provider: Provider) -> &str {
        match provider {
            Provider::Freshdesk => &self.freshdesk_secret,
            Provider::Zendesk => &self.zendesk_secret,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("AuthConfig")
            .field("freshdesk_secret", &redact(&self.freshdesk_secret))
            .field("zendesk_secret", &redact(&self.zendesk_secret))
            .finish()
    }
}

/// Circuit breaker configuration for the notification bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time spent open before a trial call is admitted (in seconds)
    pub open_timeout_secs: u64,
    /// Concurrent trial calls admitted while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_secs: 30,
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Convert to the middleware CircuitBreakerConfig
    pub fn to_middleware_config(&self) -> crate::middleware::CircuitBreakerConfig {
        crate::middleware::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            open_timeout: Duration::from_secs(self.open_timeout_secs),
            half_open_max_calls: self.half_open_max_calls,
        }
    }
}

/// Request size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted webhook body
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Channel new tickets are announced on
    pub channel: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel: ticket_bus::TICKETS_NEW_CHANNEL.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid circuit breaker configuration
    #[error("invalid circuit breaker: {0}")]
    InvalidCircuitBreaker(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Duration serialization as `"30s"`, `"500ms"` or `"2m"`
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
