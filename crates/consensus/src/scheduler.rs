//! # Round-Robin Block Generation Scheduler
//!
//! Decides from the clock alone whether this node may produce a block.
//!
//! ## How It Works
//!
//! - Every node runs the same [`SlotClock`] over the same consensus parameters
//! - The slot containing "now" names exactly one producer position
//! - A node produces only in its own slot, and only once per slot; the
//!   second condition is checked against stored blocks through a
//!   [`BlockExistenceOracle`]
//!
//! No messages are exchanged. A node whose clock or configuration drifts
//! simply stops agreeing until it converges again.

use meridian_config::ConsensusConfig;
use meridian_core::BlockExistenceOracle;
use meridian_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ScheduleError, ScheduleResult};
use crate::slot::{ScheduleConfig, Slot, SlotClock};

/// Offset past a slot boundary returned by [`BlockScheduler::next_turn`].
///
/// Avoids a tie with the last valid instant of the previous slot.
pub const TURN_OFFSET_MS: u64 = 1;

/// Block generation scheduler.
///
/// Holds the immutable schedule and a handle to the block existence oracle.
/// All methods take `&self`; one scheduler can be shared across tasks.
pub struct BlockScheduler {
    clock: SlotClock,
    oracle: Arc<dyn BlockExistenceOracle>,
}

impl BlockScheduler {
    /// Create a scheduler over an explicit schedule.
    pub fn new(config: ScheduleConfig, oracle: Arc<dyn BlockExistenceOracle>) -> Self {
        info!(
            epoch_start = %config.epoch_start(),
            slot_ms = config.slot_duration_ms(),
            nodes = config.node_count(),
            "BlockScheduler initialized"
        );

        Self {
            clock: SlotClock::new(config),
            oracle,
        }
    }

    /// Create a scheduler from consensus parameters.
    ///
    /// The slot duration is the maximum generation time plus the gap between
    /// blocks; the epoch starts at the configured first block time.
    pub fn from_config(
        config: &ConsensusConfig,
        oracle: Arc<dyn BlockExistenceOracle>,
    ) -> ScheduleResult<Self> {
        let schedule = ScheduleConfig::new(
            Timestamp::from_millis(config.first_block_time_ms),
            Duration::from_millis(config.slot_duration_ms()),
            config.number_of_nodes,
        )?;
        Ok(Self::new(schedule, oracle))
    }

    /// The slot arithmetic used by this scheduler.
    pub fn clock(&self) -> &SlotClock {
        &self.clock
    }

    /// Whether `my_position` owns the slot containing `now`.
    pub fn is_my_turn(&self, now: Timestamp, my_position: u32) -> ScheduleResult<bool> {
        self.check_position(my_position)?;
        let position = self.clock.node_position(now)?;
        Ok(position == my_position)
    }

    /// Start of the next slot owned by `my_position`, strictly after the
    /// current slot, plus [`TURN_OFFSET_MS`].
    ///
    /// When `now` is already inside an owned slot the following round's slot
    /// is returned.
    pub fn next_turn(&self, now: Timestamp, my_position: u32) -> ScheduleResult<Timestamp> {
        self.check_position(my_position)?;

        let index = self.clock.slot_index(now)?;
        let node_count = u64::from(self.clock.config().node_count());
        let position = u64::from(my_position);
        let current = index % node_count;

        // u64 so a full round past a u32::MAX sized ring cannot wrap
        let ahead = if current >= position {
            position + node_count - current
        } else {
            position - current
        };

        let turn = self
            .clock
            .slot_start(index.saturating_add(ahead))
            .saturating_add_millis(TURN_OFFSET_MS);

        debug!(
            now = %now,
            position = my_position,
            slots_ahead = ahead,
            next = %turn,
            "Computed next turn"
        );

        Ok(turn)
    }

    /// Check that `my_position` has not yet produced a block in the slot
    /// containing `now`.
    ///
    /// Returns `Ok(false)` when no such block exists and it is safe to
    /// produce. A found block is reported as [`ScheduleError::DuplicateBlock`]
    /// so the caller aborts this attempt; an unreachable oracle is reported as
    /// [`ScheduleError::Oracle`] and must not be mistaken for a duplicate.
    pub async fn block_already_exists(
        &self,
        now: Timestamp,
        my_position: u32,
    ) -> ScheduleResult<bool> {
        self.check_position(my_position)?;
        let (start, end) = self.clock.slot_interval(now)?;

        let blocks = self
            .oracle
            .find_blocks_by_node_and_time_range(my_position, start, end)
            .await
            .map_err(|e| {
                warn!(position = my_position, error = %e, "Block existence oracle failed");
                ScheduleError::Oracle(e)
            })?;

        if let Some(existing) = blocks.first() {
            warn!(
                position = my_position,
                block_id = existing.id,
                start = %start,
                end = %end,
                "Block already produced in this slot"
            );
            return Err(ScheduleError::DuplicateBlock {
                position: my_position,
                start,
                end,
            });
        }

        Ok(false)
    }

    /// Status view of the schedule at `now` for `my_position`.
    pub fn snapshot(&self, now: Timestamp, my_position: u32) -> ScheduleResult<SchedulerSnapshot> {
        let slot = self.clock.slot_at(now)?;
        Ok(SchedulerSnapshot {
            now,
            slot,
            my_position,
            my_turn: self.is_my_turn(now, my_position)?,
            next_turn: self.next_turn(now, my_position)?,
        })
    }

    fn check_position(&self, position: u32) -> ScheduleResult<()> {
        let node_count = self.clock.config().node_count();
        if position >= node_count {
            return Err(ScheduleError::InvalidNodePosition {
                position,
                node_count,
            });
        }
        Ok(())
    }
}

/// Schedule status at one instant, for logs and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Instant the snapshot was taken for
    pub now: Timestamp,
    /// Slot containing `now`
    pub slot: Slot,
    /// Position the snapshot was computed for
    pub my_position: u32,
    /// Whether `my_position` owns the current slot
    pub my_turn: bool,
    /// Next owned turn after the current slot
    pub next_turn: Timestamp,
}
