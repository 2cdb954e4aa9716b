//! # RocksDB Ticket Store
//!
//! Durable implementation of [`TicketStore`].
//!
//! ## Column Families
//!
//! - `tickets` - ticket id (16 bytes) -> JSON ticket
//! - `natural_keys` - `source \0 external_id` -> ticket id
//!
//! ## Uniqueness
//!
//! The natural-key existence check and the batch write that claims the key
//! run under one write lock, so concurrent inserts of the same key see exactly
//! one success. Calls run on the blocking pool.

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use ticket_types::{CanonicalTicket, NaturalKey};
use tracing::debug;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::ports::TicketStore;

pub const CF_TICKETS: &str = "tickets";
pub const CF_NATURAL_KEYS: &str = "natural_keys";

pub const COLUMN_FAMILIES: &[&str] = &[CF_TICKETS, CF_NATURAL_KEYS];

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/tickets".to_string(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    /// Small buffers, no fsync.
    pub fn for_testing(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

struct Inner {
    db: DB,
    write_lock: Mutex<()>,
    sync_writes: bool,
}

impl Inner {
    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::database(format!("missing column family {}", name)))
    }

    fn read_ticket(&self, id: &Uuid) -> Result<Option<CanonicalTicket>, StoreError> {
        let cf = self.cf(CF_TICKETS)?;
        match self
            .db
            .get_cf(cf, id.as_bytes())
            .map_err(|e| StoreError::database(format!("RocksDB get failed: {}", e)))?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn lookup_key(&self, key: &NaturalKey) -> Result<Option<Uuid>, StoreError> {
        let cf = self.cf(CF_NATURAL_KEYS)?;
        let raw = self
            .db
            .get_cf(cf, encode_natural_key(key))
            .map_err(|e| StoreError::database(format!("RocksDB get failed: {}", e)))?;
        match raw {
            Some(bytes) => Uuid::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::database(format!("corrupt natural key index: {}", e))),
            None => Ok(None),
        }
    }

    fn insert(&self, ticket: &CanonicalTicket) -> Result<(), StoreError> {
        let key = ticket.natural_key();
        let value = serde_json::to_vec(ticket)?;
        let tickets = self.cf(CF_TICKETS)?;
        let natural_keys = self.cf(CF_NATURAL_KEYS)?;

        let _guard = self.write_lock.lock();
        if self.lookup_key(&key)?.is_some() {
            return Err(StoreError::UniqueViolation { key });
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(tickets, ticket.id.as_bytes(), &value);
        batch.put_cf(natural_keys, encode_natural_key(&key), ticket.id.as_bytes());

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| StoreError::database(format!("RocksDB batch write failed: {}", e)))
    }

    fn count(&self) -> Result<usize, StoreError> {
        let cf = self.cf(CF_TICKETS)?;
        let mut total = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item.map_err(|e| StoreError::database(format!("RocksDB iterate failed: {}", e)))?;
            total += 1;
        }
        Ok(total)
    }
}

fn encode_natural_key(key: &NaturalKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.external_source.len() + key.external_id.len() + 1);
    out.extend_from_slice(key.external_source.as_bytes());
    out.push(0);
    out.extend_from_slice(key.external_id.as_bytes());
    out
}

/// RocksDB-backed ticket store.
#[derive(Clone)]
pub struct RocksDbTicketStore {
    inner: Arc<Inner>,
}

impl RocksDbTicketStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StoreError::database(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                write_lock: Mutex::new(()),
                sync_writes: config.sync_writes,
            }),
        })
    }

    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?;
        debug!(
            store = "rocksdb",
            op,
            ok = result.is_ok(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Store operation"
        );
        result
    }
}

#[async_trait]
impl TicketStore for RocksDbTicketStore {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<CanonicalTicket>, StoreError> {
        let key = key.clone();
        self.blocking("find_by_natural_key", move |inner| {
            match inner.lookup_key(&key)? {
                Some(id) => inner.read_ticket(&id),
                None => Ok(None),
            }
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<CanonicalTicket>, StoreError> {
        self.blocking("get", move |inner| inner.read_ticket(&id)).await
    }

    async fn insert(&self, ticket: &CanonicalTicket) -> Result<(), StoreError> {
        let ticket = ticket.clone();
        self.blocking("insert", move |inner| inner.insert(&ticket))
            .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.blocking("count", |inner| inner.count()).await
    }

    fn kind(&self) -> &'static str {
        "rocksdb"
    }
}
