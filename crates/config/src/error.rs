//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write configuration file
    #[error("Failed to write config file at {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML configuration
    #[error("Failed to serialize TOML config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Node count must be at least one
    #[error("Invalid number of nodes: must be at least 1, got {0}")]
    InvalidNodeCount(u32),

    /// Local node position outside the round-robin order
    #[error("Invalid node position {position}: must be below number_of_nodes ({node_count})")]
    InvalidNodePosition { position: u32, node_count: u32 },

    /// Slot duration too short to schedule
    #[error("Invalid slot duration: generation time plus gap must be at least 2ms, got {0}ms")]
    InvalidSlotDuration(u64),

    /// A limit that must be positive was zero
    #[error("Invalid {name}: must be positive")]
    InvalidLimit { name: &'static str },

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid socket address format
    #[error("Invalid socket address format: {0}")]
    InvalidSocketAddr(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Valid values: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Invalid log format
    #[error("Invalid log format: {0}. Valid values: text, json, compact")]
    InvalidLogFormat(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
