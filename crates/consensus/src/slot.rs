//! # Time-Slot Arithmetic
//!
//! Maps wall-clock time to slots and slots to producer positions.
//!
//! ## How It Works
//!
//! - Time after `epoch_start` is cut into fixed slots of `slot_duration`
//! - Slot `i` covers the half-open interval
//!   `[epoch_start + i * slot_duration, epoch_start + (i + 1) * slot_duration)`
//! - Slot `i` belongs to node position `i mod node_count`
//!
//! Everything here is pure integer arithmetic on milliseconds. Two nodes with
//! the same configuration and the same clock reading always compute the same
//! slot, which is the whole basis of agreement on whose turn it is.

use meridian_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ScheduleError, ScheduleResult};

/// Smallest slot duration accepted, in milliseconds.
///
/// `next_turn` offsets one millisecond past a slot boundary, which must stay
/// inside the slot.
pub const MIN_SLOT_DURATION_MS: u64 = 2;

/// Immutable schedule parameters shared by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    epoch_start: Timestamp,
    slot_duration_ms: u64,
    node_count: u32,
}

impl ScheduleConfig {
    /// Create a schedule.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `node_count` is zero or `slot_duration` is shorter
    /// than [`MIN_SLOT_DURATION_MS`].
    pub fn new(
        epoch_start: Timestamp,
        slot_duration: Duration,
        node_count: u32,
    ) -> ScheduleResult<Self> {
        if node_count == 0 {
            return Err(ScheduleError::InvalidConfig(
                "node count must be at least 1".to_string(),
            ));
        }

        let slot_duration_ms = u64::try_from(slot_duration.as_millis()).map_err(|_| {
            ScheduleError::InvalidConfig("slot duration overflows milliseconds".to_string())
        })?;
        if slot_duration_ms < MIN_SLOT_DURATION_MS {
            return Err(ScheduleError::InvalidConfig(format!(
                "slot duration must be at least {}ms, got {}ms",
                MIN_SLOT_DURATION_MS, slot_duration_ms
            )));
        }

        Ok(Self {
            epoch_start,
            slot_duration_ms,
            node_count,
        })
    }

    /// Time of the first block.
    pub fn epoch_start(&self) -> Timestamp {
        self.epoch_start
    }

    /// Slot length in milliseconds.
    pub fn slot_duration_ms(&self) -> u64 {
        self.slot_duration_ms
    }

    /// Slot length.
    pub fn slot_duration(&self) -> Duration {
        Duration::from_millis(self.slot_duration_ms)
    }

    /// Number of nodes in the round-robin order.
    pub fn node_count(&self) -> u32 {
        self.node_count
    }
}

/// A slot resolved from a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot index since `epoch_start`
    pub index: u64,
    /// Position of the node that owns this slot
    pub node_position: u32,
    /// First instant of the slot (inclusive)
    pub start: Timestamp,
    /// First instant after the slot (exclusive)
    pub end: Timestamp,
}

impl Slot {
    /// Whether `t` falls inside this slot.
    pub fn contains(&self, t: Timestamp) -> bool {
        self.start <= t && t < self.end
    }
}

/// Pure slot arithmetic over a [`ScheduleConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClock {
    config: ScheduleConfig,
}

impl SlotClock {
    /// Create a clock for a schedule.
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    /// The schedule this clock computes over.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Slot index containing `t`.
    ///
    /// # Errors
    ///
    /// `TimeBeforeEpoch` if `t` precedes the first block.
    pub fn slot_index(&self, t: Timestamp) -> ScheduleResult<u64> {
        let elapsed = t
            .millis_since(self.config.epoch_start)
            .ok_or(ScheduleError::TimeBeforeEpoch {
                time: t,
                epoch_start: self.config.epoch_start,
            })?;
        Ok(elapsed / self.config.slot_duration_ms)
    }

    /// Position of the node that owns the slot containing `t`.
    pub fn node_position(&self, t: Timestamp) -> ScheduleResult<u32> {
        let index = self.slot_index(t)?;
        Ok(self.position_of(index))
    }

    /// Half-open `[start, end)` interval of the slot containing `t`.
    pub fn slot_interval(&self, t: Timestamp) -> ScheduleResult<(Timestamp, Timestamp)> {
        let index = self.slot_index(t)?;
        let start = self.slot_start(index);
        let end = start.saturating_add_millis(self.config.slot_duration_ms);
        Ok((start, end))
    }

    /// Resolve the full slot containing `t`.
    pub fn slot_at(&self, t: Timestamp) -> ScheduleResult<Slot> {
        let index = self.slot_index(t)?;
        let start = self.slot_start(index);
        Ok(Slot {
            index,
            node_position: self.position_of(index),
            start,
            end: start.saturating_add_millis(self.config.slot_duration_ms),
        })
    }

    /// First instant of slot `index`.
    pub fn slot_start(&self, index: u64) -> Timestamp {
        self.config
            .epoch_start
            .saturating_add_millis(index.saturating_mul(self.config.slot_duration_ms))
    }

    fn position_of(&self, index: u64) -> u32 {
        // node_count >= 1, and the remainder is below node_count so it fits in u32
        (index % u64::from(self.config.node_count)) as u32
    }
}
