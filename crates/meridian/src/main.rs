//! # Meridian Node
//!
//! Main entry point for the Meridian node.
//!
//! - `start` runs block generation and the confirmation responder
//! - `check-contracts` compiles a contracts directory and lists its objects
//! - `run-tx` executes one transaction without storing it
//! - `schedule` shows slot ownership for a point in time
//! - `init` writes a default configuration file

use anyhow::{bail, Context, Result};
use clap::Parser;
use meridian::{build_vm, load_contracts, Node, TxProcessor, DEFAULT_CONFIG_FILE};
use meridian_config::{Config, StorageBackend};
use meridian_consensus::BlockScheduler;
use meridian_storage::{Database, DatabaseConfig, MemoryBlockStore, RocksBlockStore};
use meridian_types::Timestamp;
use meridian_vm::{stdlib, ExtendMap, FieldType, Value, Vm};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Meridian node and tools
#[derive(Parser, Debug)]
#[command(name = "meridian")]
#[command(version)]
#[command(about = "Meridian node - round-robin block production with contract transactions")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: text, json, or compact
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
    Compact,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the Meridian node
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Data directory (overrides config file)
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Node position (overrides config file)
        #[arg(long)]
        position: Option<u32>,
    },

    /// Compile contract sources and list the installed objects
    CheckContracts {
        /// Contracts directory
        dir: PathBuf,
    },

    /// Run a transaction once and print its payload
    RunTx {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Contract name
        contract: String,

        /// Field values as `name=value`
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// Show the slot schedule at a point in time
    Schedule {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Unix time in milliseconds (default: now)
        #[arg(long)]
        at: Option<u64>,

        /// Node position (default: from config)
        #[arg(long)]
        position: Option<u32>,
    },

    /// Write a default configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Meridian");

    match cli.command {
        Commands::Start {
            config,
            data_dir,
            position,
        } => handle_start(config, data_dir, position).await,
        Commands::CheckContracts { dir } => handle_check_contracts(dir),
        Commands::RunTx {
            config,
            contract,
            fields,
        } => handle_run_tx(config, contract, fields),
        Commands::Schedule {
            config,
            at,
            position,
        } => handle_schedule(config, at, position),
        Commands::Init { output, force } => handle_init(output, force),
    }
}

/// Initialize tracing with the configured format and verbosity
fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = match cli.verbose {
        0 => "info,meridian=info",
        1 => "info,meridian=debug,meridian_consensus=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(env_filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(env_filter)
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(fmt::layer().compact())
                .with(env_filter)
                .init();
        }
    }

    Ok(())
}

/// Handle the `start` command
async fn handle_start(
    config_path: PathBuf,
    data_dir: Option<String>,
    position: Option<u32>,
) -> Result<()> {
    info!(config = %config_path.display(), "Loading configuration");

    let mut config = Config::load(&config_path)?;
    if let Some(dir) = data_dir {
        config.node.data_dir = dir;
    }
    if let Some(position) = position {
        config.consensus.node_position = position;
    }
    config.validate().context("invalid configuration after overrides")?;

    match config.storage.backend {
        StorageBackend::Rocksdb => {
            let path = Path::new(&config.node.data_dir).join(&config.storage.db_dir);
            std::fs::create_dir_all(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            let db = Database::open(DatabaseConfig {
                path: path.to_string_lossy().to_string(),
                enable_compression: config.storage.compression,
                ..Default::default()
            })?;
            let store = Arc::new(RocksBlockStore::new(Arc::new(db)));
            Node::new(config, store)?.run().await
        }
        StorageBackend::Memory => {
            info!("Using in-memory block store, blocks are lost on exit");
            let store = Arc::new(MemoryBlockStore::new());
            Node::new(config, store)?.run().await
        }
    }
}

/// Handle the `check-contracts` command
fn handle_check_contracts(dir: PathBuf) -> Result<()> {
    let vm = Vm::default();
    vm.extend(stdlib())?;
    load_contracts(&vm, &dir)?;

    let tree = vm.tree();
    println!("{:>6}  {:<8}  {:<32}  fields", "id", "kind", "name");
    for (name, object) in tree.named() {
        let fields = match object.as_contract() {
            Some(info) => info
                .tx_fields
                .iter()
                .map(|f| {
                    let suffix = if f.optional { "?" } else { "" };
                    format!("{}:{}{}", f.name, f.ty.name(), suffix)
                })
                .collect::<Vec<_>>()
                .join(" "),
            None => String::new(),
        };
        println!("{:>6}  {:<8}  {:<32}  {}", object.id, object.kind.name(), name, fields);
    }
    println!("{} objects", tree.len());

    Ok(())
}

/// Handle the `run-tx` command
fn handle_run_tx(config_path: PathBuf, contract: String, fields: Vec<String>) -> Result<()> {
    let config = Config::load(&config_path)?;
    let vm = build_vm(&config)?;

    let Some(handle) = vm.lookup_by_name(&contract) else {
        bail!("unknown contract: {}", contract);
    };

    let mut extend = ExtendMap::new();
    for field in &fields {
        let (name, raw) = field
            .split_once('=')
            .with_context(|| format!("field {:?} is not name=value", field))?;
        let ty = handle
            .tx_fields()
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.ty)
            .with_context(|| format!("contract {} has no field {}", contract, name))?;
        extend.insert(name.to_string(), parse_field(ty, raw)?);
    }

    let processed = TxProcessor::new(vm).process(&contract, extend)?;
    println!("payload: {}", processed.payload);
    println!("hash:    {}", processed.hash);
    Ok(())
}

fn parse_field(ty: FieldType, raw: &str) -> Result<Value> {
    Ok(match ty {
        FieldType::String => Value::Str(raw.to_string()),
        FieldType::Int64 => Value::Int(
            raw.parse()
                .with_context(|| format!("{:?} is not an integer", raw))?,
        ),
        FieldType::Bytes => {
            let digits = raw.strip_prefix("0x").unwrap_or(raw);
            Value::Bytes(hex::decode(digits).with_context(|| format!("{:?} is not hex", raw))?)
        }
    })
}

/// Handle the `schedule` command
fn handle_schedule(config_path: PathBuf, at: Option<u64>, position: Option<u32>) -> Result<()> {
    let config = Config::load(&config_path)?;
    let scheduler =
        BlockScheduler::from_config(&config.consensus, Arc::new(MemoryBlockStore::new()))?;

    let now = at.map(Timestamp::from_millis).unwrap_or_else(Timestamp::now);
    let position = position.unwrap_or(config.consensus.node_position);
    let snapshot = scheduler.snapshot(now, position)?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Handle the `init` command
fn handle_init(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = Config::default();
    config.save(&output)?;
    info!(path = %output.display(), "Wrote default configuration");

    println!("Configuration written to {}", output.display());
    println!("  Node: {}", config.node.name);
    println!(
        "  Position: {}/{}",
        config.consensus.node_position, config.consensus.number_of_nodes
    );
    Ok(())
}
