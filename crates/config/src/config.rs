//! Main configuration module for Meridian
//!
//! Every setting is read from a single `meridian.toml` file. Missing sections
//! fall back to their defaults, so an empty file describes a one-node
//! development chain.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct containing all Meridian settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Node identity
    pub node: NodeConfig,

    /// Chain-wide block scheduling parameters
    pub consensus: ConsensusConfig,

    /// Contract VM settings
    pub vm: VmConfig,

    /// Block store settings
    pub storage: StorageConfig,

    /// Confirmation responder settings
    pub confirmation: ConfirmationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use meridian_config::Config;
    /// use std::path::Path;
    ///
    /// let config = Config::load(Path::new("meridian.toml"))?;
    /// ```
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!("Loading configuration from {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content)?;

        debug!("Configuration parsed successfully, validating...");
        config.validate()?;

        info!(
            "Configuration loaded: node={}, position={}/{}",
            config.node.name, config.consensus.node_position, config.consensus.number_of_nodes
        );

        Ok(config)
    }

    /// Load configuration from a TOML string.
    ///
    /// Useful for testing or when configuration is provided as a string.
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.node.validate()?;
        self.consensus.validate()?;
        self.vm.validate()?;
        self.storage.validate()?;
        self.confirmation.validate()?;
        self.logging.validate()?;

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

// =============================================================================
// Node Configuration
// =============================================================================

/// Node identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Human-readable node name used in logs
    pub name: String,

    /// Data directory root
    pub data_dir: String,
}

impl NodeConfig {
    /// Validate the node configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.is_empty() {
            return Err(ConfigError::MissingField("node.data_dir"));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "meridian-0".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

// =============================================================================
// Consensus Configuration
// =============================================================================

/// Block scheduling parameters.
///
/// `first_block_time_ms`, `max_block_generation_time_ms`,
/// `gap_between_blocks_secs` and `number_of_nodes` are consensus-controlled:
/// every node must use identical values or the nodes will disagree on whose
/// turn it is. `node_position` is this node's own rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Recorded time of the first block, in milliseconds since the Unix epoch
    pub first_block_time_ms: u64,

    /// Maximum time a node may spend generating a block
    pub max_block_generation_time_ms: u64,

    /// Idle gap between consecutive blocks
    pub gap_between_blocks_secs: u64,

    /// Number of nodes in the round-robin order
    pub number_of_nodes: u32,

    /// This node's position in the round-robin order
    pub node_position: u32,

    /// Maximum transactions packed into one block
    pub max_block_transactions: usize,
}

impl ConsensusConfig {
    /// Validate the consensus configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.number_of_nodes == 0 {
            return Err(ConfigError::InvalidNodeCount(0));
        }

        if self.node_position >= self.number_of_nodes {
            return Err(ConfigError::InvalidNodePosition {
                position: self.node_position,
                node_count: self.number_of_nodes,
            });
        }

        let slot = self.slot_duration_ms();
        if slot < 2 {
            return Err(ConfigError::InvalidSlotDuration(slot));
        }

        if self.max_block_transactions == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "consensus.max_block_transactions",
            });
        }

        Ok(())
    }

    /// Slot duration: generation time plus the gap between blocks.
    pub fn slot_duration_ms(&self) -> u64 {
        self.max_block_generation_time_ms
            .saturating_add(self.gap_between_blocks_secs.saturating_mul(1000))
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            first_block_time_ms: 0,
            max_block_generation_time_ms: 2000,
            gap_between_blocks_secs: 2,
            number_of_nodes: 1,
            node_position: 0,
            max_block_transactions: 1000,
        }
    }
}

// =============================================================================
// VM Configuration
// =============================================================================

/// Contract VM limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum instructions a single run may execute
    pub max_steps: u64,

    /// Maximum nested function call depth
    pub max_call_depth: usize,

    /// Maximum accepted contract source size in bytes
    pub max_source_bytes: usize,

    /// Directory of `*.contract` sources compiled at startup
    pub contracts_dir: Option<String>,
}

impl VmConfig {
    /// Validate the VM configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_steps == 0 {
            return Err(ConfigError::InvalidLimit { name: "vm.max_steps" });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "vm.max_call_depth",
            });
        }
        if self.max_source_bytes == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "vm.max_source_bytes",
            });
        }
        Ok(())
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 64,
            max_source_bytes: 1024 * 1024,
            contracts_dir: None,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Block store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// RocksDB under `node.data_dir`
    Rocksdb,
    /// Volatile in-memory store
    Memory,
}

/// Block store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection
    pub backend: StorageBackend,

    /// Database directory name, relative to `node.data_dir`
    pub db_dir: String,

    /// Enable LZ4 compression
    pub compression: bool,
}

impl StorageConfig {
    /// Validate the storage configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backend == StorageBackend::Rocksdb && self.db_dir.is_empty() {
            return Err(ConfigError::MissingField("storage.db_dir"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Rocksdb,
            db_dir: "blocks".to_string(),
            compression: true,
        }
    }
}

// =============================================================================
// Confirmation Responder Configuration
// =============================================================================

/// Confirmation responder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Serve confirmation requests
    pub enabled: bool,

    /// TCP listen address
    pub listen_addr: String,
}

impl ConfirmationConfig {
    /// Validate the confirmation configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.enabled {
            self.socket_addr()?;
        }
        Ok(())
    }

    /// Parsed listen address.
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidSocketAddr(self.listen_addr.clone()))
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:7078".to_string(),
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json, compact)
    pub format: String,
}

impl LoggingConfig {
    /// Validate the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.level.clone()));
        }

        let valid_formats = ["text", "json", "compact"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogFormat(self.format.clone()));
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
