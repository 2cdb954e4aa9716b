//! Adapter construction from parsed backends.

use std::sync::Arc;

use ingestion_gateway::{GatewayError, IngestionService};
use ticket_bus::{BusError, InMemoryTicketBus, NotificationPublisher};
use ticket_storage::{InMemoryTicketStore, StoreError, TicketStore};
use tracing::info;

use super::config::{BusBackend, IngestionConfig, StorageBackend};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The URL names a backend this binary was built without.
    #[error("{backend} support is not compiled in (enable the `{feature}` feature)")]
    FeatureDisabled {
        backend: &'static str,
        feature: &'static str,
    },

    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("notification bus: {0}")]
    Bus(#[from] BusError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub fn build_store(backend: &StorageBackend) -> Result<Arc<dyn TicketStore>, AdapterError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryTicketStore::new())),
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb { path } => {
            let store =
                ticket_storage::RocksDbTicketStore::open(ticket_storage::RocksDbConfig::at(path))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb { .. } => Err(AdapterError::FeatureDisabled {
            backend: "rocksdb",
            feature: "rocksdb",
        }),
    }
}

/// Redis connections are verified with PING; an unreachable server fails here.
pub async fn build_bus(
    backend: &BusBackend,
) -> Result<Arc<dyn NotificationPublisher>, AdapterError> {
    match backend {
        BusBackend::Memory => Ok(Arc::new(InMemoryTicketBus::new())),
        #[cfg(feature = "redis")]
        BusBackend::Redis { url } => {
            let bus =
                ticket_bus::RedisTicketBus::connect(ticket_bus::RedisBusConfig::new(url.as_str()))
                    .await?;
            Ok(Arc::new(bus))
        }
        #[cfg(not(feature = "redis"))]
        BusBackend::Redis { .. } => Err(AdapterError::FeatureDisabled {
            backend: "redis",
            feature: "redis",
        }),
    }
}

/// Build both adapters and the gateway over them.
pub async fn build_service(config: IngestionConfig) -> Result<IngestionService, AdapterError> {
    let store = build_store(&config.storage)?;
    info!(store = store.kind(), "Ticket store ready");

    let bus = build_bus(&config.bus).await?;
    info!(bus = bus.kind(), "Notification bus ready");

    Ok(IngestionService::new(config.gateway, store, bus)?)
}
