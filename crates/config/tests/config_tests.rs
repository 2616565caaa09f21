//! Tests for Config module

use meridian_config::{
    Config, ConfigError, ConfirmationConfig, ConsensusConfig, LoggingConfig, StorageBackend,
    StorageConfig, VmConfig,
};
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.consensus.number_of_nodes, 1);
    assert_eq!(config.consensus.slot_duration_ms(), 4000);
    assert_eq!(config.vm.max_steps, 1_000_000);
    assert_eq!(config.storage.backend, StorageBackend::Rocksdb);
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config.node.name, "meridian-0");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_slot_duration_combines_generation_and_gap() {
    let config = ConsensusConfig {
        max_block_generation_time_ms: 500,
        gap_between_blocks_secs: 3,
        ..Default::default()
    };
    assert_eq!(config.slot_duration_ms(), 3500);
}

#[test]
fn test_zero_nodes_rejected() {
    let config = ConsensusConfig {
        number_of_nodes: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidNodeCount(0))));
}

#[test]
fn test_position_outside_order_rejected() {
    let config = ConsensusConfig {
        number_of_nodes: 3,
        node_position: 3,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidNodePosition {
            position: 3,
            node_count: 3
        })
    ));
}

#[test]
fn test_too_short_slot_rejected() {
    let config = ConsensusConfig {
        max_block_generation_time_ms: 1,
        gap_between_blocks_secs: 0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSlotDuration(1))
    ));
}

#[test]
fn test_vm_limits_must_be_positive() {
    let config = VmConfig {
        max_steps: 0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidLimit { name: "vm.max_steps" })
    ));
}

#[test]
fn test_rocksdb_requires_db_dir() {
    let mut config = StorageConfig {
        db_dir: String::new(),
        ..Default::default()
    };
    assert!(config.validate().is_err());

    config.backend = StorageBackend::Memory;
    assert!(config.validate().is_ok());
}

#[test]
fn test_confirmation_listen_addr() {
    let mut config = ConfirmationConfig::default();
    assert!(config.socket_addr().is_ok());

    config.listen_addr = "not-an-address".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSocketAddr(_))
    ));

    config.enabled = false;
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_log_level() {
    let config = LoggingConfig {
        level: "verbose".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidLogLevel(_))
    ));
}

#[test]
fn test_parse_full_toml() {
    let toml = r#"
        [node]
        name = "node-b"
        data_dir = "/var/lib/meridian"

        [consensus]
        first_block_time_ms = 1500000000000
        max_block_generation_time_ms = 2000
        gap_between_blocks_secs = 3
        number_of_nodes = 5
        node_position = 4

        [vm]
        max_steps = 5000
        contracts_dir = "contracts"

        [storage]
        backend = "memory"

        [confirmation]
        listen_addr = "0.0.0.0:7078"

        [logging]
        level = "debug"
        format = "json"
    "#;

    let config = Config::from_str(toml).unwrap();
    assert_eq!(config.node.name, "node-b");
    assert_eq!(config.consensus.number_of_nodes, 5);
    assert_eq!(config.consensus.node_position, 4);
    assert_eq!(config.consensus.slot_duration_ms(), 5000);
    assert_eq!(config.vm.max_steps, 5000);
    assert_eq!(config.vm.max_call_depth, 64);
    assert_eq!(config.vm.contracts_dir.as_deref(), Some("contracts"));
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_invalid_toml() {
    assert!(matches!(
        Config::from_str("[consensus\nnumber_of_nodes = 1"),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meridian.toml");

    let mut config = Config::default();
    config.consensus.number_of_nodes = 4;
    config.consensus.node_position = 2;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.consensus.number_of_nodes, 4);
    assert_eq!(loaded.consensus.node_position, 2);
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = Config::load(&dir.path().join("missing.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead { .. })));
}
