//! # Meridian Core - Collaborator Interfaces
//!
//! The scheduler and the confirmation responder never talk to a concrete
//! database. They depend on the traits defined here, so the RocksDB store,
//! the in-memory store used by tests and any future backend are
//! interchangeable.
//!
//! | Concern | Trait | Implementations |
//! |---------|-------|-----------------|
//! | Duplicate-slot detection | `BlockExistenceOracle` | `RocksBlockStore`, `MemoryBlockStore` |
//! | Block lookup by id | `BlockSource` | `RocksBlockStore`, `MemoryBlockStore` |
//!
//! All traits require `Send + Sync` so one store can be shared by the
//! generation loop and the confirmation responder.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod traits;

pub use traits::{BlockExistenceOracle, BlockSource, OracleError, OracleResult};
