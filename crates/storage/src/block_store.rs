//! Block stores
//!
//! Two backends answer the scheduler's existence queries and the
//! confirmation responder's lookups:
//!
//! - [`RocksBlockStore`] persists blocks in the [`Database`]
//! - [`MemoryBlockStore`] keeps them in ordered maps, for tests and the
//!   `memory` backend

use async_trait::async_trait;
use meridian_core::{BlockExistenceOracle, BlockSource, OracleResult};
use meridian_types::{Block, BlockRef, Timestamp};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::db::{cf, Database};
use crate::{Result, StorageError};

const LAST_BLOCK_KEY: &[u8] = b"last_block_id";

/// Writable block store.
pub trait BlockStore: BlockExistenceOracle + BlockSource {
    /// Store `block`, replacing any block with the same id.
    fn put_block(&self, block: &Block) -> Result<()>;

    /// Blocks by `node_position` with `start <= time < end`, by time.
    fn blocks_in_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<BlockRef>>;

    /// Block with `id`.
    fn get_block(&self, id: u64) -> Result<Option<Block>>;

    /// Block with the highest id.
    fn get_last_block(&self) -> Result<Option<Block>>;
}

/// `position ‖ time ‖ id`, big-endian.
fn node_key(node_position: u32, time: Timestamp, id: u64) -> [u8; 20] {
    let mut key = [0u8; 20];
    key[..4].copy_from_slice(&node_position.to_be_bytes());
    key[4..12].copy_from_slice(&time.as_millis().to_be_bytes());
    key[12..].copy_from_slice(&id.to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Corruption(format!("block id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

// =============================================================================
// RocksDB
// =============================================================================

/// Block store backed by RocksDB.
#[derive(Clone)]
pub struct RocksBlockStore {
    db: Arc<Database>,
}

impl RocksBlockStore {
    /// Wrap an open database.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Underlying database.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

impl BlockStore for RocksBlockStore {
    fn put_block(&self, block: &Block) -> Result<()> {
        let encoded =
            serde_json::to_vec(block).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let encoded_ref = serde_json::to_vec(&block.to_ref())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let id = block.id.to_be_bytes();

        let blocks = self.db.cf_handle(cf::BLOCKS)?;
        let by_node = self.db.cf_handle(cf::BLOCKS_BY_NODE)?;
        let metadata = self.db.cf_handle(cf::METADATA)?;

        self.db.update(|batch| {
            // a replaced block may have moved to another producer or time
            if let Some(old) = self.get_block(block.id)? {
                batch.delete_cf(&by_node, &node_key(old.node_position, old.time, old.id));
            }
            batch.put_cf(&blocks, &id, &encoded);
            batch.put_cf(
                &by_node,
                &node_key(block.node_position, block.time, block.id),
                &encoded_ref,
            );

            let last = match self.db.get(cf::METADATA, LAST_BLOCK_KEY)? {
                Some(bytes) => Some(decode_id(&bytes)?),
                None => None,
            };
            if last.map_or(true, |last| block.id > last) {
                batch.put_cf(&metadata, LAST_BLOCK_KEY, &id);
            }
            Ok(())
        })?;
        debug!(id = block.id, position = block.node_position, time = %block.time, "Stored block");
        Ok(())
    }

    fn blocks_in_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<BlockRef>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let from = node_key(node_position, start, 0);
        let to = node_key(node_position, end, 0);

        self.db
            .range(cf::BLOCKS_BY_NODE, &from, &to)?
            .into_iter()
            .map(|(_, value)| {
                serde_json::from_slice(&value).map_err(|e| StorageError::Corruption(e.to_string()))
            })
            .collect()
    }

    fn get_block(&self, id: u64) -> Result<Option<Block>> {
        match self.db.get(cf::BLOCKS, &id.to_be_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Corruption(e.to_string())),
            None => Ok(None),
        }
    }

    fn get_last_block(&self) -> Result<Option<Block>> {
        match self.db.get(cf::METADATA, LAST_BLOCK_KEY)? {
            Some(bytes) => self.get_block(decode_id(&bytes)?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BlockExistenceOracle for RocksBlockStore {
    async fn find_blocks_by_node_and_time_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> OracleResult<Vec<BlockRef>> {
        Ok(self.blocks_in_range(node_position, start, end)?)
    }
}

#[async_trait]
impl BlockSource for RocksBlockStore {
    async fn block(&self, id: u64) -> OracleResult<Option<Block>> {
        Ok(self.get_block(id)?)
    }

    async fn last_block(&self) -> OracleResult<Option<Block>> {
        Ok(self.get_last_block()?)
    }
}

// =============================================================================
// In memory
// =============================================================================

#[derive(Default)]
struct MemoryInner {
    blocks: BTreeMap<u64, Block>,
    by_node: BTreeMap<(u32, Timestamp, u64), BlockRef>,
}

/// Volatile block store.
#[derive(Default)]
pub struct MemoryBlockStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryBlockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    /// Whether no block is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }
}

impl BlockStore for MemoryBlockStore {
    fn put_block(&self, block: &Block) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(old) = inner.blocks.insert(block.id, block.clone()) {
            inner.by_node.remove(&(old.node_position, old.time, old.id));
        }
        inner
            .by_node
            .insert((block.node_position, block.time, block.id), block.to_ref());
        Ok(())
    }

    fn blocks_in_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<BlockRef>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let inner = self.inner.read();
        Ok(inner
            .by_node
            .range((node_position, start, 0)..(node_position, end, 0))
            .map(|(_, block_ref)| block_ref.clone())
            .collect())
    }

    fn get_block(&self, id: u64) -> Result<Option<Block>> {
        Ok(self.inner.read().blocks.get(&id).cloned())
    }

    fn get_last_block(&self) -> Result<Option<Block>> {
        Ok(self
            .inner
            .read()
            .blocks
            .last_key_value()
            .map(|(_, block)| block.clone()))
    }
}

#[async_trait]
impl BlockExistenceOracle for MemoryBlockStore {
    async fn find_blocks_by_node_and_time_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> OracleResult<Vec<BlockRef>> {
        Ok(self.blocks_in_range(node_position, start, end)?)
    }
}

#[async_trait]
impl BlockSource for MemoryBlockStore {
    async fn block(&self, id: u64) -> OracleResult<Option<Block>> {
        Ok(self.get_block(id)?)
    }

    async fn last_block(&self) -> OracleResult<Option<Block>> {
        Ok(self.get_last_block()?)
    }
}
