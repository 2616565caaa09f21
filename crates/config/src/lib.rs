//! # Meridian Configuration
//!
//! Configuration parsing and validation for the Meridian node.
//!
//! All node settings live in one `meridian.toml` file. The consensus section
//! carries the chain-wide scheduling parameters every node must agree on;
//! the remaining sections are local to the node.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("meridian.toml"))?;
//! println!("Slot duration: {}ms", config.consensus.slot_duration_ms());
//! ```
//!
//! ## Configuration Sections
//!
//! - `[node]` - Node identity and data directory
//! - `[consensus]` - First block time, generation time, gap, node count
//! - `[vm]` - Contract VM limits and contract source directory
//! - `[storage]` - Block store backend
//! - `[confirmation]` - Confirmation responder listen address
//! - `[logging]` - Log level and format

mod config;
mod error;

pub use config::*;
pub use error::*;
