//! # Meridian Types
//!
//! Core type definitions shared by the Meridian node crates.
//!
//! This crate provides:
//! - [`H256`] - 32-byte hashes with Keccak256 support
//! - [`Timestamp`] - millisecond wall-clock instants used by the slot scheduler
//! - [`Block`] and [`BlockRef`] - stored blocks and the lightweight view returned
//!   by existence queries
//!
//! ## Example
//!
//! ```rust
//! use meridian_types::{H256, Timestamp};
//!
//! let hash = H256::keccak256(b"hello world");
//! assert_ne!(hash, H256::NIL);
//!
//! let t = Timestamp::from_secs(25);
//! assert_eq!(t.as_millis(), 25_000);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod block;
pub mod hash;
pub mod time;

// Re-export main types at crate root
pub use block::{Block, BlockRef};
pub use hash::{keccak256, H256, HASH_SIZE};
pub use time::Timestamp;

/// Result type alias for type conversions
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with Meridian types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}
