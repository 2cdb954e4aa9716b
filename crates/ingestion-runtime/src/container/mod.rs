//! # Service Container
//!
//! Turns an [`IngestionConfig`] into a running gateway: builds the storage
//! and notification adapters named by their URLs and injects them into the
//! [`IngestionService`](ingestion_gateway::IngestionService).

pub mod adapters;
pub mod config;

pub use adapters::{build_bus, build_service, build_store, AdapterError};
pub use config::{BusBackend, ConfigError, IngestionConfig, StorageBackend};
