//! # Meridian
//!
//! Meridian is a small permissioned chain. A fixed set of nodes take turns
//! producing blocks in round-robin time slots, and every transaction is a
//! call into a contract written in the Meridian contract language.
//!
//! This crate provides the node binary and can also be used as a library
//! for embedding a node into other applications.
//!
//! ## Components
//!
//! - [`Node`] - wires storage, VM, generator and responder together
//! - [`BlockGenerator`] - produces blocks on this node's slots
//! - [`TxProcessor`] - runs transactions through their contracts
//! - [`ConfirmationResponder`] - answers block hash queries over TCP
//!
//! ## Example
//!
//! ```rust,no_run
//! use meridian::Node;
//! use meridian_config::Config;
//! use meridian_storage::MemoryBlockStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("meridian.toml"))?;
//!     let node = Node::new(config, Arc::new(MemoryBlockStore::new()))?;
//!     node.run().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod confirmation;
pub mod generator;
pub mod node;
pub mod queue;
pub mod submission;

pub use confirmation::{confirm, ConfirmationResponder, REQUEST_SIZE, RESPONSE_SIZE};
pub use generator::{BlockGenerator, GeneratorError, TickOutcome};
pub use node::{build_vm, load_contracts, Node, CONTRACT_EXTENSION};
pub use queue::{PendingTx, TxQueue};
pub use submission::{ProcessedTx, SubmitError, TxProcessor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "meridian.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_CONFIG_FILE, "meridian.toml");
        assert_eq!(CONTRACT_EXTENSION, "contract");
    }
}
