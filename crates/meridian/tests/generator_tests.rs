//! Integration tests for the block generation loop

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meridian::{BlockGenerator, PendingTx, TickOutcome, TxProcessor, TxQueue};
use meridian_consensus::{BlockScheduler, ScheduleConfig};
use meridian_core::{BlockExistenceOracle, OracleError, OracleResult};
use meridian_storage::{BlockStore, MemoryBlockStore};
use meridian_types::{BlockRef, Timestamp};
use meridian_vm::{stdlib, ExtendMap, Value, Vm};
use tokio::sync::broadcast;

const COUNTER: &str = r#"
contract Add {
    tx { N int }
    func front {
        if $N < 0 { error "negative" }
    }
}
"#;

/// Position 1 of 3, 10 second slots from the Unix epoch.
const POSITION: u32 = 1;

struct Harness {
    generator: BlockGenerator<MemoryBlockStore>,
    store: Arc<MemoryBlockStore>,
    queue: Arc<TxQueue>,
}

fn harness_with(
    epoch: Timestamp,
    oracle: Option<Arc<dyn BlockExistenceOracle>>,
    max: usize,
) -> Harness {
    let store = Arc::new(MemoryBlockStore::new());
    let queue = Arc::new(TxQueue::new());

    let vm = Vm::default();
    vm.extend(stdlib()).unwrap();
    vm.compile(COUNTER).unwrap();

    let schedule = ScheduleConfig::new(epoch, Duration::from_secs(10), 3).unwrap();
    let oracle = match oracle {
        Some(oracle) => oracle,
        None => Arc::clone(&store) as Arc<dyn BlockExistenceOracle>,
    };
    let generator = BlockGenerator::new(
        BlockScheduler::new(schedule, oracle),
        Arc::clone(&store),
        TxProcessor::new(Arc::new(vm)),
        Arc::clone(&queue),
        POSITION,
        max,
    );

    Harness {
        generator,
        store,
        queue,
    }
}

fn harness() -> Harness {
    harness_with(Timestamp::UNIX_EPOCH, None, 100)
}

fn add(n: i64) -> PendingTx {
    let mut fields = ExtendMap::new();
    fields.insert("N".into(), Value::Int(n));
    PendingTx::new("Add", fields)
}

fn secs(s: u64) -> Timestamp {
    Timestamp::from_secs(s)
}

/// Oracle whose backend is down.
struct Unreachable;

#[async_trait]
impl BlockExistenceOracle for Unreachable {
    async fn find_blocks_by_node_and_time_range(
        &self,
        _node_position: u32,
        _start: Timestamp,
        _end: Timestamp,
    ) -> OracleResult<Vec<BlockRef>> {
        Err(OracleError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_other_nodes_slot() {
    let h = harness();
    h.queue.push(add(1));

    let outcome = h.generator.tick(secs(5)).await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::NotMyTurn {
            next: Timestamp::from_millis(10_001)
        }
    );
    assert_eq!(h.queue.len(), 1);
}

#[tokio::test]
async fn test_empty_queue_is_idle() {
    let h = harness();
    assert_eq!(h.generator.tick(secs(12)).await.unwrap(), TickOutcome::Idle);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_one_block_per_slot() {
    let h = harness();
    h.queue.push(add(1));
    h.queue.push(add(2));

    let block = match h.generator.tick(secs(12)).await.unwrap() {
        TickOutcome::Produced(block) => block,
        other => panic!("expected a block, got {:?}", other),
    };
    assert_eq!(block.id, 1);
    assert_eq!(block.node_position, POSITION);
    assert_eq!(block.time, secs(12));
    assert_eq!(block.transactions, vec![r#"{"N": 1}"#, r#"{"N": 2}"#]);
    assert_eq!(block.hash(), Some(block.compute_hash()));

    // same slot, new work: refused, work stays queued
    h.queue.push(add(3));
    assert_eq!(
        h.generator.tick(secs(15)).await.unwrap(),
        TickOutcome::AlreadyProduced {
            next: Timestamp::from_millis(40_001)
        }
    );
    assert_eq!(h.queue.len(), 1);

    // next owned slot continues the chain
    match h.generator.tick(secs(41)).await.unwrap() {
        TickOutcome::Produced(block) => {
            assert_eq!(block.id, 2);
            assert_eq!(block.transactions, vec![r#"{"N": 3}"#]);
        }
        other => panic!("expected a block, got {:?}", other),
    }
    assert_eq!(h.store.len(), 2);
}

#[tokio::test]
async fn test_rejected_transactions_are_dropped() {
    let h = harness();
    h.queue.push(add(-1));
    h.queue.push(PendingTx::new("Nope", ExtendMap::new()));

    assert_eq!(h.generator.tick(secs(12)).await.unwrap(), TickOutcome::Idle);
    assert!(h.queue.is_empty());
    assert!(h.store.is_empty());

    // the slot is still free
    h.queue.push(add(-1));
    h.queue.push(add(7));
    match h.generator.tick(secs(13)).await.unwrap() {
        TickOutcome::Produced(block) => assert_eq!(block.transactions, vec![r#"{"N": 7}"#]),
        other => panic!("expected a block, got {:?}", other),
    }
}

#[tokio::test]
async fn test_block_size_limit() {
    let h = harness_with(Timestamp::UNIX_EPOCH, None, 2);
    for n in 0..3 {
        h.queue.push(add(n));
    }

    match h.generator.tick(secs(12)).await.unwrap() {
        TickOutcome::Produced(block) => assert_eq!(block.transactions.len(), 2),
        other => panic!("expected a block, got {:?}", other),
    }
    assert_eq!(h.queue.len(), 1);
}

#[tokio::test]
async fn test_oracle_outage_keeps_queue() {
    let h = harness_with(Timestamp::UNIX_EPOCH, Some(Arc::new(Unreachable)), 100);
    h.queue.push(add(1));

    assert_eq!(
        h.generator.tick(secs(12)).await.unwrap(),
        TickOutcome::OracleUnavailable
    );
    assert_eq!(h.queue.len(), 1);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_before_first_block() {
    let h = harness_with(secs(100), None, 100);
    assert_eq!(
        h.generator.tick(secs(50)).await.unwrap(),
        TickOutcome::BeforeEpoch { starts: secs(100) }
    );
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let h = harness();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(h.generator.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
