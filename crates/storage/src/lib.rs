//! Meridian Storage Layer
//!
//! Block persistence for the Meridian node:
//!
//! - **Database**: RocksDB wrapper with column families for blocks, the
//!   producer/time index and metadata
//! - **Block stores**: [`RocksBlockStore`] and [`MemoryBlockStore`], both
//!   serving the scheduler's existence queries and block lookups by id

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod block_store;
pub mod db;

pub use block_store::{BlockStore, MemoryBlockStore, RocksBlockStore};
pub use db::{Database, DatabaseConfig, WriteBatch};

use meridian_core::OracleError;
use thiserror::Error;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored record could not be decoded
    #[error("Corrupt record: {0}")]
    Corruption(String),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for OracleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corruption(msg) => OracleError::Corruption(msg),
            other => OracleError::Unavailable(other.to_string()),
        }
    }
}
