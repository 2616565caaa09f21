//! # Meridian Consensus
//!
//! Round-robin block generation scheduling for the Meridian network.
//!
//! Time after the first block is divided into fixed slots. Each slot belongs
//! to exactly one node position, cycling through all positions in order. A
//! node may produce at most one block, and only in a slot it owns.
//!
//! ## Schedule
//!
//! ```text
//! epoch_start
//!     │
//!     ▼
//!     ┌──────────┬──────────┬──────────┬──────────┬──────────┐
//!     │ slot 0   │ slot 1   │ slot 2   │ slot 3   │ slot 4   │ ...
//!     │ node 0   │ node 1   │ node 2   │ node 0   │ node 1   │
//!     └──────────┴──────────┴──────────┴──────────┴──────────┘
//!     |<-slot--->|
//!      generation time + gap between blocks
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_consensus::{BlockScheduler, ScheduleConfig};
//! use meridian_types::Timestamp;
//! use std::time::Duration;
//!
//! let schedule = ScheduleConfig::new(Timestamp::UNIX_EPOCH, Duration::from_secs(10), 3)?;
//! let scheduler = BlockScheduler::new(schedule, oracle);
//!
//! let now = Timestamp::from_secs(25);
//! assert!(scheduler.is_my_turn(now, 2)?);
//! assert_eq!(scheduler.next_turn(now, 0)?, Timestamp::from_millis(30_001));
//! ```
//!
//! ## Guarantees
//!
//! - Nodes with identical parameters and clocks agree on the slot owner
//! - `next_turn` always lands strictly after the current slot, on an owned slot
//! - A failing existence oracle is never reported as a duplicate block

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod scheduler;
pub mod slot;

pub use error::{ScheduleError, ScheduleResult};
pub use scheduler::{BlockScheduler, SchedulerSnapshot, TURN_OFFSET_MS};
pub use slot::{ScheduleConfig, Slot, SlotClock, MIN_SLOT_DURATION_MS};
