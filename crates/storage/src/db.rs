//! RocksDB wrapper with column families for block data
//!
//! Three column families are opened:
//!
//! | Family | Key | Value |
//! |--------|-----|-------|
//! | `blocks` | block id (BE u64) | JSON-encoded block |
//! | `blocks_by_node` | position (BE u32) ‖ time (BE u64) ‖ id (BE u64) | JSON-encoded block ref |
//! | `metadata` | ASCII key | raw bytes |
//!
//! Big-endian keys make lexicographic order match numeric order, so a time
//! window of one producer is a contiguous key range.

use parking_lot::RwLock;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatchWithTransaction, WriteOptions, DB,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{Result, StorageError};

/// Column family names
pub mod cf {
    /// Blocks by id
    pub const BLOCKS: &str = "blocks";
    /// Block refs by producer position and time
    pub const BLOCKS_BY_NODE: &str = "blocks_by_node";
    /// Store metadata (last block id)
    pub const METADATA: &str = "metadata";

    /// All column families
    pub const ALL: &[&str] = &[BLOCKS, BLOCKS_BY_NODE, METADATA];
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database directory
    pub path: String,
    /// Enable compression (LZ4)
    pub enable_compression: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size in bytes
    pub write_buffer_size: usize,
    /// Sync every write to disk
    pub sync_writes: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::from("./data/meridian/blocks"),
            enable_compression: true,
            max_open_files: 256,
            write_buffer_size: 16 * 1024 * 1024, // 16 MB
            sync_writes: false,
        }
    }
}

/// Write batch for atomic operations
#[derive(Default)]
pub struct WriteBatch {
    inner: WriteBatchWithTransaction<false>,
}

impl WriteBatch {
    /// Create a new write batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a key-value pair into the batch for a specific column family
    pub fn put_cf(&mut self, cf: &Arc<BoundColumnFamily<'_>>, key: &[u8], value: &[u8]) {
        self.inner.put_cf(cf, key, value);
    }

    /// Delete a key from a specific column family
    pub fn delete_cf(&mut self, cf: &Arc<BoundColumnFamily<'_>>, key: &[u8]) {
        self.inner.delete_cf(cf, key);
    }

    /// Number of operations in the batch
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// RocksDB wrapper with column families
pub struct Database {
    inner: DBWithThreadMode<MultiThreaded>,
    config: DatabaseConfig,
    write_lock: RwLock<()>,
}

impl Database {
    /// Open or create a database at the configured path
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        info!(path = %config.path, "Opening block database");

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);
        if config.enable_compression {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf::ALL
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if config.enable_compression {
                    cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                }
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, Path::new(&config.path), cf_descriptors)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        info!(column_families = cf::ALL.len(), "Block database opened");

        Ok(Self {
            inner: db,
            config,
            write_lock: RwLock::new(()),
        })
    }

    /// Open a database at `path` with default settings
    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(DatabaseConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    /// Get a column family handle
    pub fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.inner
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Get a value from a column family
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(cf_name)?;
        self.inner
            .get_cf(&cf, key)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Put a value into a column family
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf_handle(cf_name)?;
        let _guard = self.write_lock.write();
        self.inner
            .put_cf(&cf, key, value)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Execute a write batch atomically
    pub fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let _guard = self.write_lock.write();
        self.commit(batch)
    }

    /// Build a batch with `build` and write it, holding the write lock
    /// throughout so reads made by `build` see no concurrent writes.
    ///
    /// `build` must not call [`Database::put`] or [`Database::write_batch`].
    pub fn update<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(&mut WriteBatch) -> Result<()>,
    {
        let _guard = self.write_lock.write();
        let mut batch = WriteBatch::new();
        build(&mut batch)?;
        self.commit(batch)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.inner
            .write_opt(batch.inner, &write_opts)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Entries with `start <= key < end`, in key order
    pub fn range(&self, cf_name: &str, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf_handle(cf_name)?;
        let mut out = Vec::new();
        for item in self
            .inner
            .iterator_cf(&cf, IteratorMode::From(start, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| StorageError::Database(e.to_string()))?;
            if &key[..] >= end {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        debug!(cf = cf_name, entries = out.len(), "Range scan");
        Ok(out)
    }

    /// Flush all column families to disk
    pub fn flush_all(&self) -> Result<()> {
        for name in cf::ALL {
            let cf = self.cf_handle(name)?;
            self.inner
                .flush_cf(&cf)
                .map_err(|e| StorageError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Path to the database
    pub fn path(&self) -> &str {
        &self.config.path
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        debug!(path = %self.config.path, "Closing block database");
    }
}
