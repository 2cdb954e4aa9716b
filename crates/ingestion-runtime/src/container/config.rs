//! # Process Configuration
//!
//! Everything is read from the environment (after an optional `.env`).
//! Unset variables take their defaults; a variable that is set but cannot
//! be parsed is a startup error naming the variable.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PORT` | `8080` |
//! | `DATABASE_URL` | `memory://` |
//! | `REDIS_URL` | `memory://` |
//! | `FRESHDESK_WEBHOOK_SECRET` | empty (validation off) |
//! | `ZENDESK_WEBHOOK_SECRET` | empty (validation off) |
//! | `RATE_LIMIT_PER_MINUTE` | `100` |
//! | `RATE_LIMIT_MAX_CLIENTS` | `10000` |
//! | `CIRCUIT_BREAKER_THRESHOLD` | `5` |
//! | `CIRCUIT_BREAKER_TIMEOUT` | `30` (seconds) |
//! | `CIRCUIT_BREAKER_HALF_OPEN_CALLS` | `1` |
//! | `MAX_BODY_BYTES` | `1048576` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ingestion_gateway::GatewayConfig;

pub const MEMORY_SCHEME: &str = "memory://";
pub const ROCKSDB_SCHEME: &str = "rocksdb://";
pub const REDIS_SCHEME: &str = "redis://";
pub const REDIS_TLS_SCHEME: &str = "rediss://";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("{var}: cannot parse {value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// A connection string uses a scheme with no adapter.
    #[error("{var}: unsupported url {url:?} (expected {expected})")]
    UnsupportedUrl {
        var: &'static str,
        url: String,
        expected: &'static str,
    },

    /// The assembled gateway configuration is rejected.
    #[error(transparent)]
    Gateway(#[from] ingestion_gateway::domain::config::ConfigError),
}

/// Where tickets are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    RocksDb { path: PathBuf },
}

impl StorageBackend {
    pub fn parse(var: &'static str, url: &str) -> Result<Self, ConfigError> {
        if url == MEMORY_SCHEME {
            return Ok(StorageBackend::Memory);
        }
        if let Some(path) = url.strip_prefix(ROCKSDB_SCHEME) {
            if !path.is_empty() {
                return Ok(StorageBackend::RocksDb { path: path.into() });
            }
        }
        Err(ConfigError::UnsupportedUrl {
            var,
            url: url.to_string(),
            expected: "memory:// or rocksdb://<path>",
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::RocksDb { .. } => "rocksdb",
        }
    }
}

/// Where new-ticket notifications go.
#[derive(Clone, PartialEq, Eq)]
pub enum BusBackend {
    Memory,
    Redis { url: String },
}

impl BusBackend {
    pub fn parse(var: &'static str, url: &str) -> Result<Self, ConfigError> {
        if url == MEMORY_SCHEME {
            return Ok(BusBackend::Memory);
        }
        if url.starts_with(REDIS_SCHEME) || url.starts_with(REDIS_TLS_SCHEME) {
            return Ok(BusBackend::Redis {
                url: url.to_string(),
            });
        }
        Err(ConfigError::UnsupportedUrl {
            var,
            url: redact_url(url),
            expected: "memory://, redis:// or rediss://",
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BusBackend::Memory => "memory",
            BusBackend::Redis { .. } => "redis",
        }
    }
}

// Redis URLs may carry a password
impl fmt::Debug for BusBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusBackend::Memory => write!(f, "Memory"),
            BusBackend::Redis { url } => f
                .debug_struct("Redis")
                .field("url", &redact_url(url))
                .finish(),
        }
    }
}

/// Drop the userinfo part of a URL.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub gateway: GatewayConfig,
    pub storage: StorageBackend,
    pub bus: BusBackend,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            storage: StorageBackend::Memory,
            bus: BusBackend::Memory,
        }
    }
}

impl IngestionConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let gateway = &mut config.gateway;

        if let Some(port) = parse_var(&lookup, "PORT")? {
            gateway.http.port = port;
        }
        if let Some(secret) = lookup("FRESHDESK_WEBHOOK_SECRET") {
            gateway.auth.freshdesk_secret = secret;
        }
        if let Some(secret) = lookup("ZENDESK_WEBHOOK_SECRET") {
            gateway.auth.zendesk_secret = secret;
        }
        if let Some(budget) = parse_var(&lookup, "RATE_LIMIT_PER_MINUTE")? {
            gateway.rate_limit.requests_per_minute = budget;
        }
        if let Some(max_clients) = parse_var(&lookup, "RATE_LIMIT_MAX_CLIENTS")? {
            gateway.rate_limit.max_clients = max_clients;
        }
        if let Some(threshold) = parse_var(&lookup, "CIRCUIT_BREAKER_THRESHOLD")? {
            gateway.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(timeout) = parse_var(&lookup, "CIRCUIT_BREAKER_TIMEOUT")? {
            gateway.circuit_breaker.open_timeout_secs = timeout;
        }
        if let Some(calls) = parse_var(&lookup, "CIRCUIT_BREAKER_HALF_OPEN_CALLS")? {
            gateway.circuit_breaker.half_open_max_calls = calls;
        }
        if let Some(limit) = parse_var(&lookup, "MAX_BODY_BYTES")? {
            gateway.limits.max_body_bytes = limit;
        }

        if let Some(url) = non_blank(&lookup, "DATABASE_URL") {
            config.storage = StorageBackend::parse("DATABASE_URL", &url)?;
        }
        if let Some(url) = non_blank(&lookup, "REDIS_URL") {
            config.bus = BusBackend::parse("REDIS_URL", &url)?;
        }

        config.gateway.validate()?;
        Ok(config)
    }
}

fn non_blank<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match non_blank(lookup, var) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                reason: e.to_string(),
                value,
            }),
    }
}
