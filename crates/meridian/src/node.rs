//! Meridian node
//!
//! The node wires the pieces together:
//!
//! - Contract VM with the default builtins and the contracts directory
//! - Block scheduler backed by the block store
//! - Block generator running on this node's slots
//! - Confirmation responder answering block hash queries
//!
//! `run` starts the background tasks and blocks until Ctrl+C,
//! [`Node::shutdown_handle`] fires or the generator fails, then stops them.

use anyhow::{anyhow, Context, Result};
use meridian_config::Config;
use meridian_consensus::BlockScheduler;
use meridian_storage::BlockStore;
use meridian_vm::{stdlib, Vm};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::confirmation::ConfirmationResponder;
use crate::generator::{BlockGenerator, GeneratorError};
use crate::queue::{PendingTx, TxQueue};
use crate::submission::{SubmitError, TxProcessor};

/// File extension of contract sources in the contracts directory
pub const CONTRACT_EXTENSION: &str = "contract";

/// How long background tasks get to stop
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Compile and install every contract source under `dir`.
///
/// Files are compiled in path order so object ids are the same on every
/// node loading the same directory. Returns the number of installed objects.
pub fn load_contracts(vm: &Vm, dir: &Path) -> Result<usize> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("reading contracts directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(CONTRACT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut installed = 0;
    for path in &paths {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let root = vm
            .compile(&source)
            .with_context(|| format!("compiling {}", path.display()))?;
        debug!(file = %path.display(), objects = root.len(), "Loaded contract source");
        installed += root.len();
    }

    info!(dir = %dir.display(), files = paths.len(), objects = installed, "Contracts loaded");
    Ok(installed)
}

/// Build a VM from `config` with the default builtins and contracts.
pub fn build_vm(config: &Config) -> Result<Arc<Vm>> {
    let vm = Vm::from_config(&config.vm);
    vm.extend(stdlib()).context("registering default builtins")?;
    if let Some(dir) = &config.vm.contracts_dir {
        load_contracts(&vm, Path::new(dir))?;
    }
    Ok(Arc::new(vm))
}

/// A running Meridian node.
pub struct Node<S> {
    config: Config,
    store: Arc<S>,
    vm: Arc<Vm>,
    queue: Arc<TxQueue>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<S> Node<S>
where
    S: BlockStore + 'static,
{
    /// Create a node over `store`.
    pub fn new(config: Config, store: Arc<S>) -> Result<Self> {
        let vm = build_vm(&config)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            name = %config.node.name,
            position = config.consensus.node_position,
            nodes = config.consensus.number_of_nodes,
            "Node initialized"
        );

        Ok(Self {
            config,
            store,
            vm,
            queue: Arc::new(TxQueue::new()),
            shutdown_tx,
        })
    }

    /// Node configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The contract VM.
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    /// The block store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Pending transactions.
    pub fn queue(&self) -> &Arc<TxQueue> {
        &self.queue
    }

    /// Sender that stops [`Node::run`] when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Queue a transaction for the next owned slot.
    pub fn submit(&self, tx: PendingTx) -> Result<(), SubmitError> {
        if self.vm.lookup_by_name(&tx.contract).is_none() {
            return Err(SubmitError::UnknownContract(tx.contract));
        }
        self.queue.push(tx);
        Ok(())
    }

    /// Block generator for this node.
    pub fn generator(&self) -> Result<BlockGenerator<S>> {
        let scheduler = BlockScheduler::from_config(&self.config.consensus, self.store.clone())
            .context("building block scheduler")?;
        Ok(BlockGenerator::new(
            scheduler,
            Arc::clone(&self.store),
            TxProcessor::new(Arc::clone(&self.vm)),
            Arc::clone(&self.queue),
            self.config.consensus.node_position,
            self.config.consensus.max_block_transactions,
        ))
    }

    /// Run until Ctrl+C or a shutdown signal.
    ///
    /// A generator failure shuts the node down and is returned as the error.
    pub async fn run(self) -> Result<()> {
        let mut stop_rx = self.shutdown_tx.subscribe();
        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        let generator = self.generator()?;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let failed_tx = self.shutdown_tx.clone();
        let generator_handle: JoinHandle<Result<(), GeneratorError>> =
            tokio::spawn(async move {
                let result = generator.run(shutdown_rx).await;
                if result.is_err() {
                    let _ = failed_tx.send(());
                }
                result
            });

        if self.config.confirmation.enabled {
            let addr = self.config.confirmation.socket_addr()?;
            let responder = ConfirmationResponder::bind(addr, Arc::clone(&self.store))
                .await
                .with_context(|| format!("binding confirmation responder to {}", addr))?;
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(("confirmation", tokio::spawn(responder.run(shutdown_rx))));
        }

        info!(tasks = handles.len() + 1, "Node is running");

        tokio::select! {
            _ = stop_rx.recv() => {
                info!("Received shutdown signal");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating shutdown");
            }
        }

        let _ = self.shutdown_tx.send(());

        let failure = match tokio::time::timeout(SHUTDOWN_TIMEOUT, generator_handle).await {
            Ok(Ok(Ok(()))) => {
                debug!(task = "generator", "Task stopped");
                None
            }
            Ok(Ok(Err(e))) => Some(anyhow::Error::new(e).context("block generator failed")),
            Ok(Err(e)) => Some(anyhow!("block generator panicked: {}", e)),
            Err(_) => {
                warn!(task = "generator", "Task shutdown timed out");
                None
            }
        };

        for (name, handle) in handles {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(_) => debug!(task = name, "Task stopped"),
                Err(_) => warn!(task = name, "Task shutdown timed out"),
            }
        }

        match failure {
            Some(e) => {
                error!(error = ?e, queued = self.queue.len(), "Node stopped after failure");
                Err(e)
            }
            None => {
                info!(queued = self.queue.len(), "Node stopped");
                Ok(())
            }
        }
    }
}
