//! Integration tests for the block generation scheduler.

use async_trait::async_trait;
use meridian_config::ConsensusConfig;
use meridian_consensus::{BlockScheduler, ScheduleConfig, ScheduleError};
use meridian_core::{BlockExistenceOracle, OracleError, OracleResult};
use meridian_types::{BlockRef, Timestamp, H256};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Oracle backed by a fixed list of produced blocks.
#[derive(Default)]
struct FakeOracle {
    blocks: Mutex<Vec<BlockRef>>,
    fail: bool,
}

impl FakeOracle {
    fn with_block(position: u32, time_ms: u64) -> Self {
        let oracle = Self::default();
        oracle.blocks.lock().push(BlockRef {
            id: 1,
            hash: H256::keccak256(b"block").as_bytes().to_vec(),
            node_position: position,
            time: Timestamp::from_millis(time_ms),
        });
        oracle
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl BlockExistenceOracle for FakeOracle {
    async fn find_blocks_by_node_and_time_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> OracleResult<Vec<BlockRef>> {
        if self.fail {
            return Err(OracleError::Unavailable("store offline".into()));
        }
        Ok(self
            .blocks
            .lock()
            .iter()
            .filter(|b| b.node_position == node_position && start <= b.time && b.time < end)
            .cloned()
            .collect())
    }
}

fn scheduler_with(oracle: FakeOracle, slot_ms: u64, nodes: u32) -> BlockScheduler {
    let schedule =
        ScheduleConfig::new(Timestamp::UNIX_EPOCH, Duration::from_millis(slot_ms), nodes).unwrap();
    BlockScheduler::new(schedule, Arc::new(oracle))
}

fn three_node_scheduler() -> BlockScheduler {
    scheduler_with(FakeOracle::default(), 10_000, 3)
}

#[test]
fn test_reference_schedule() {
    let scheduler = three_node_scheduler();
    let now = Timestamp::from_secs(25);

    assert_eq!(scheduler.clock().slot_index(now).unwrap(), 2);
    assert!(scheduler.is_my_turn(now, 2).unwrap());
    assert!(!scheduler.is_my_turn(now, 0).unwrap());
    assert!(!scheduler.is_my_turn(now, 1).unwrap());
    assert_eq!(
        scheduler.next_turn(now, 0).unwrap(),
        Timestamp::from_millis(30_001)
    );
}

#[test]
fn test_next_turn_when_already_my_turn_skips_full_round() {
    let scheduler = three_node_scheduler();
    let now = Timestamp::from_secs(25);

    // slot 2 is owned by position 2, so the next owned slot is 5
    assert_eq!(
        scheduler.next_turn(now, 2).unwrap(),
        Timestamp::from_millis(50_001)
    );
}

#[test]
fn test_next_turn_lands_on_own_slot() {
    let scheduler = scheduler_with(FakeOracle::default(), 7, 5);

    for now_ms in (0..500).step_by(3) {
        let now = Timestamp::from_millis(now_ms);
        let current = scheduler.clock().slot_at(now).unwrap();
        for position in 0..5 {
            let turn = scheduler.next_turn(now, position).unwrap();
            assert!(turn > now);
            assert!(turn >= current.end);
            assert!(scheduler.is_my_turn(turn, position).unwrap());
            // at most one full round ahead
            assert!(turn < current.end.saturating_add_millis(5 * 7));
        }
    }
}

#[test]
fn test_next_turn_on_largest_ring() {
    let scheduler = scheduler_with(FakeOracle::default(), 2, u32::MAX);
    let last = u64::from(u32::MAX - 1);
    let round = u64::from(u32::MAX);
    let now = Timestamp::from_millis(last * 2);

    // own slot: a whole round of u32::MAX slots ahead
    assert_eq!(
        scheduler.next_turn(now, u32::MAX - 1).unwrap(),
        Timestamp::from_millis((last + round) * 2 + 1)
    );
    // wraps to the start of the next round
    assert_eq!(
        scheduler.next_turn(now, 0).unwrap(),
        Timestamp::from_millis(round * 2 + 1)
    );
}

#[test]
fn test_single_node_owns_every_slot() {
    let scheduler = scheduler_with(FakeOracle::default(), 4000, 1);

    for secs in [0, 3, 4, 100, 12_345] {
        let now = Timestamp::from_secs(secs);
        assert!(scheduler.is_my_turn(now, 0).unwrap());
        let slot = scheduler.clock().slot_at(now).unwrap();
        assert_eq!(
            scheduler.next_turn(now, 0).unwrap(),
            slot.end.saturating_add_millis(1)
        );
    }
}

#[test]
fn test_exactly_one_owner_per_instant() {
    let scheduler = three_node_scheduler();

    for now_ms in (0..100_000).step_by(777) {
        let now = Timestamp::from_millis(now_ms);
        let owners = (0..3)
            .filter(|p| scheduler.is_my_turn(now, *p).unwrap())
            .count();
        assert_eq!(owners, 1);
    }
}

#[test]
fn test_invalid_position_rejected() {
    let scheduler = three_node_scheduler();
    let now = Timestamp::from_secs(25);

    assert!(matches!(
        scheduler.is_my_turn(now, 3),
        Err(ScheduleError::InvalidNodePosition {
            position: 3,
            node_count: 3
        })
    ));
    assert!(matches!(
        scheduler.next_turn(now, 7),
        Err(ScheduleError::InvalidNodePosition { .. })
    ));
}

#[test]
fn test_time_before_epoch_rejected() {
    let schedule = ScheduleConfig::new(
        Timestamp::from_secs(100),
        Duration::from_secs(10),
        3,
    )
    .unwrap();
    let scheduler = BlockScheduler::new(schedule, Arc::new(FakeOracle::default()));

    assert!(matches!(
        scheduler.is_my_turn(Timestamp::from_secs(99), 0),
        Err(ScheduleError::TimeBeforeEpoch { .. })
    ));
    assert!(matches!(
        scheduler.next_turn(Timestamp::from_secs(50), 0),
        Err(ScheduleError::TimeBeforeEpoch { .. })
    ));
}

#[tokio::test]
async fn test_no_block_in_slot() {
    let scheduler = three_node_scheduler();
    let exists = scheduler
        .block_already_exists(Timestamp::from_secs(25), 2)
        .await
        .unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn test_block_in_slot_is_duplicate() {
    let scheduler = scheduler_with(FakeOracle::with_block(2, 21_500), 10_000, 3);

    let result = scheduler
        .block_already_exists(Timestamp::from_secs(25), 2)
        .await;
    match result {
        Err(ScheduleError::DuplicateBlock {
            position,
            start,
            end,
        }) => {
            assert_eq!(position, 2);
            assert_eq!(start, Timestamp::from_secs(20));
            assert_eq!(end, Timestamp::from_secs(30));
        }
        other => panic!("expected DuplicateBlock, got {:?}", other),
    }
}

#[tokio::test]
async fn test_block_outside_slot_is_not_duplicate() {
    // end of the interval is exclusive
    let scheduler = scheduler_with(FakeOracle::with_block(2, 30_000), 10_000, 3);
    assert!(!scheduler
        .block_already_exists(Timestamp::from_secs(25), 2)
        .await
        .unwrap());

    // another position's block in the same window does not count
    let scheduler = scheduler_with(FakeOracle::with_block(1, 22_000), 10_000, 3);
    assert!(!scheduler
        .block_already_exists(Timestamp::from_secs(25), 2)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_oracle_failure_is_not_duplicate() {
    let scheduler = scheduler_with(FakeOracle::failing(), 10_000, 3);

    let err = scheduler
        .block_already_exists(Timestamp::from_secs(25), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::Oracle(OracleError::Unavailable(_))));
    assert!(err.is_transient());
}

#[test]
fn test_from_config() {
    let config = ConsensusConfig {
        first_block_time_ms: 1_000,
        max_block_generation_time_ms: 2_000,
        gap_between_blocks_secs: 3,
        number_of_nodes: 4,
        node_position: 1,
        ..Default::default()
    };
    let scheduler = BlockScheduler::from_config(&config, Arc::new(FakeOracle::default())).unwrap();

    let schedule = scheduler.clock().config();
    assert_eq!(schedule.epoch_start(), Timestamp::from_millis(1_000));
    assert_eq!(schedule.slot_duration_ms(), 5_000);
    assert_eq!(schedule.node_count(), 4);

    // slot 1 starts at 6s
    assert!(scheduler.is_my_turn(Timestamp::from_millis(6_000), 1).unwrap());
}

#[test]
fn test_from_config_rejects_zero_nodes() {
    let config = ConsensusConfig {
        number_of_nodes: 0,
        ..Default::default()
    };
    assert!(matches!(
        BlockScheduler::from_config(&config, Arc::new(FakeOracle::default())),
        Err(ScheduleError::InvalidConfig(_))
    ));
}

#[test]
fn test_snapshot() {
    let scheduler = three_node_scheduler();
    let snapshot = scheduler.snapshot(Timestamp::from_secs(25), 0).unwrap();

    assert_eq!(snapshot.slot.index, 2);
    assert_eq!(snapshot.slot.node_position, 2);
    assert!(!snapshot.my_turn);
    assert_eq!(snapshot.next_turn, Timestamp::from_millis(30_001));
}
