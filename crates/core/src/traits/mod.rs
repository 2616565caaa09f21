//! Core traits for Meridian collaborators.
//!
//! Crates depend on these traits rather than on a concrete store:
//!
//! ```ignore
//! use meridian_core::traits::BlockExistenceOracle;
//!
//! async fn slot_taken<O: BlockExistenceOracle + ?Sized>(oracle: &O) -> bool {
//!     // Works with any backend
//! #   unimplemented!()
//! }
//! ```

mod storage;

pub use storage::*;
