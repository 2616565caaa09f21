//! Pending transaction queue
//!
//! Submitted transactions wait here until the node's next owned slot. The
//! generator drains at most `max_block_transactions` per block; the rest stay
//! queued in arrival order.

use meridian_vm::ExtendMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

/// A transaction waiting for a block.
#[derive(Debug, Clone)]
pub struct PendingTx {
    /// Contract to run
    pub contract: String,
    /// Typed field values, keyed by field name
    pub fields: ExtendMap,
}

impl PendingTx {
    /// Create a pending transaction.
    pub fn new(contract: impl Into<String>, fields: ExtendMap) -> Self {
        Self {
            contract: contract.into(),
            fields,
        }
    }
}

/// FIFO queue shared between submitters and the generator.
#[derive(Debug, Default)]
pub struct TxQueue {
    inner: Mutex<VecDeque<PendingTx>>,
}

impl TxQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction.
    pub fn push(&self, tx: PendingTx) {
        let mut inner = self.inner.lock();
        trace!(contract = %tx.contract, queued = inner.len() + 1, "Queued transaction");
        inner.push_back(tx);
    }

    /// Remove up to `max` transactions from the front.
    pub fn drain(&self, max: usize) -> Vec<PendingTx> {
        let mut inner = self.inner.lock();
        let take = max.min(inner.len());
        inner.drain(..take).collect()
    }

    /// Number of queued transactions.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_keeps_order_and_remainder() {
        let queue = TxQueue::new();
        for name in ["A", "B", "C"] {
            queue.push(PendingTx::new(name, ExtendMap::new()));
        }

        let first: Vec<_> = queue.drain(2).into_iter().map(|tx| tx.contract).collect();
        assert_eq!(first, vec!["A", "B"]);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain(10).len(), 1);
        assert!(queue.is_empty());
        assert!(queue.drain(10).is_empty());
    }
}
