//! Scheduling errors

use meridian_core::OracleError;
use meridian_types::Timestamp;
use thiserror::Error;

/// Errors that can occur while scheduling block generation
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The queried time precedes the first block
    #[error("time {time} is before the first block at {epoch_start}")]
    TimeBeforeEpoch {
        /// Queried time
        time: Timestamp,
        /// Time of the first block
        epoch_start: Timestamp,
    },

    /// Node position outside the round-robin order
    #[error("invalid node position {position}: only {node_count} nodes are scheduled")]
    InvalidNodePosition {
        /// Requested position
        position: u32,
        /// Configured node count
        node_count: u32,
    },

    /// This node already produced a block in the current slot
    #[error("block for this time interval exists: node {position} in [{start}, {end})")]
    DuplicateBlock {
        /// Producer position
        position: u32,
        /// Slot start (inclusive)
        start: Timestamp,
        /// Slot end (exclusive)
        end: Timestamp,
    },

    /// Schedule parameters violate an invariant
    #[error("invalid schedule configuration: {0}")]
    InvalidConfig(String),

    /// The block existence oracle failed; the slot state is unknown
    #[error("block existence check failed: {0}")]
    Oracle(#[from] OracleError),
}

impl ScheduleError {
    /// Whether retrying later may succeed.
    ///
    /// Only oracle outages are transient. Clock, configuration and duplicate
    /// errors need operator attention or a new slot.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScheduleError::Oracle(_))
    }
}

/// Result type for scheduling operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;
