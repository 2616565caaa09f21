//! Block generation loop
//!
//! Every tick asks the scheduler whether the current slot belongs to this
//! node. On an owned slot that has no block from us yet, queued transactions
//! are run through their contracts and the accepted ones are sealed into a
//! block. Between owned slots the loop sleeps until the next turn.

use meridian_consensus::{BlockScheduler, ScheduleError};
use meridian_storage::{BlockStore, StorageError};
use meridian_types::{Block, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::queue::TxQueue;
use crate::submission::TxProcessor;

/// How long to wait before re-checking an owned slot with an empty queue
pub const IDLE_POLL: Duration = Duration::from_millis(250);

/// How long to wait after the existence oracle failed
pub const ORACLE_RETRY: Duration = Duration::from_secs(1);

/// Errors that stop block generation
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Scheduling failed for a reason retrying will not fix
    #[error("scheduling failed: {0}")]
    Schedule(#[from] ScheduleError),

    /// The block store failed
    #[error("block store failed: {0}")]
    Storage(#[from] StorageError),
}

/// Result of a single generation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The chain has not started yet
    BeforeEpoch {
        /// Time of the first slot
        starts: Timestamp,
    },
    /// The current slot belongs to another node
    NotMyTurn {
        /// Start of our next slot (plus the turn offset)
        next: Timestamp,
    },
    /// We already produced a block in this slot
    AlreadyProduced {
        /// Start of our next slot (plus the turn offset)
        next: Timestamp,
    },
    /// The existence check failed; the slot state is unknown
    OracleUnavailable,
    /// Our slot, but no transaction was accepted
    Idle,
    /// A block was stored
    Produced(Block),
}

/// Produces blocks on this node's slots.
pub struct BlockGenerator<S> {
    scheduler: BlockScheduler,
    store: Arc<S>,
    processor: TxProcessor,
    queue: Arc<TxQueue>,
    position: u32,
    max_transactions: usize,
}

impl<S> BlockGenerator<S>
where
    S: BlockStore + 'static,
{
    /// Create a generator for the node at `position`.
    pub fn new(
        scheduler: BlockScheduler,
        store: Arc<S>,
        processor: TxProcessor,
        queue: Arc<TxQueue>,
        position: u32,
        max_transactions: usize,
    ) -> Self {
        Self {
            scheduler,
            store,
            processor,
            queue,
            position,
            max_transactions,
        }
    }

    /// The scheduler deciding turns.
    pub fn scheduler(&self) -> &BlockScheduler {
        &self.scheduler
    }

    /// Run one generation step at `now`.
    pub async fn tick(&self, now: Timestamp) -> Result<TickOutcome, GeneratorError> {
        let epoch_start = self.scheduler.clock().config().epoch_start();
        if now < epoch_start {
            return Ok(TickOutcome::BeforeEpoch {
                starts: epoch_start,
            });
        }

        if !self.scheduler.is_my_turn(now, self.position)? {
            let next = self.scheduler.next_turn(now, self.position)?;
            return Ok(TickOutcome::NotMyTurn { next });
        }

        match self.scheduler.block_already_exists(now, self.position).await {
            Ok(_) => {}
            Err(ScheduleError::DuplicateBlock { .. }) => {
                let next = self.scheduler.next_turn(now, self.position)?;
                return Ok(TickOutcome::AlreadyProduced { next });
            }
            Err(e) if e.is_transient() => return Ok(TickOutcome::OracleUnavailable),
            Err(e) => return Err(e.into()),
        }

        let pending = self.queue.drain(self.max_transactions);
        if pending.is_empty() {
            return Ok(TickOutcome::Idle);
        }

        let drained = pending.len();
        let mut payloads = Vec::with_capacity(drained);
        for tx in pending {
            match self.processor.process(&tx.contract, tx.fields) {
                Ok(processed) => payloads.push(processed.payload),
                Err(e) => debug!(contract = %tx.contract, error = %e, "Dropping transaction"),
            }
        }
        if payloads.is_empty() {
            debug!(drained, "No transaction accepted in this slot");
            return Ok(TickOutcome::Idle);
        }

        let id = match self.store.get_last_block()? {
            Some(last) => last.id + 1,
            None => 1,
        };
        let block = Block::new(id, self.position, now, payloads);
        self.store.put_block(&block)?;

        info!(
            id = block.id,
            position = self.position,
            time = %block.time,
            transactions = block.transactions.len(),
            dropped = drained - block.transactions.len(),
            "Produced block"
        );
        Ok(TickOutcome::Produced(block))
    }

    /// Tick until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), GeneratorError> {
        info!(position = self.position, "Block generator started");

        loop {
            let now = Timestamp::now();
            let wait = match self.tick(now).await {
                Ok(TickOutcome::BeforeEpoch { starts }) => {
                    debug!(starts = %starts, "Waiting for the first slot");
                    now.duration_until(starts)
                }
                Ok(TickOutcome::NotMyTurn { next }) | Ok(TickOutcome::AlreadyProduced { next }) => {
                    debug!(next = %next, "Sleeping until next turn");
                    now.duration_until(next)
                }
                Ok(TickOutcome::OracleUnavailable) => {
                    warn!(retry_in = ?ORACLE_RETRY, "Slot state unknown, retrying");
                    ORACLE_RETRY
                }
                Ok(TickOutcome::Idle) => IDLE_POLL,
                Ok(TickOutcome::Produced(_)) => Duration::ZERO,
                Err(e) => {
                    error!(error = %e, "Block generation stopped");
                    return Err(e);
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    info!("Block generator shutting down");
                    return Ok(());
                }
            }
        }
    }
}
