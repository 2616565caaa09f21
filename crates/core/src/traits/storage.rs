//! Block storage collaborator traits.

use async_trait::async_trait;
use meridian_types::{Block, BlockRef, Timestamp};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by block storage collaborators.
///
/// These are infrastructure faults. A successful query that finds a block is
/// never reported through this type.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The backing store could not be reached or returned an I/O failure.
    #[error("block store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("corrupt block record: {0}")]
    Corruption(String),
}

/// Result type for collaborator queries.
pub type OracleResult<T> = Result<T, OracleError>;

/// Answers "has this node already produced a block in this time window".
///
/// The query may block on external storage. Callers must not hold VM or
/// scheduler locks while awaiting it.
#[async_trait]
pub trait BlockExistenceOracle: Send + Sync {
    /// Returns every block produced by `node_position` with
    /// `start <= time < end`, ordered by time.
    async fn find_blocks_by_node_and_time_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> OracleResult<Vec<BlockRef>>;
}

/// Looks up stored blocks by id.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Returns the block with `id`, or `Ok(None)` if it is not stored.
    async fn block(&self, id: u64) -> OracleResult<Option<Block>>;

    /// Returns the highest stored block, if any.
    async fn last_block(&self) -> OracleResult<Option<Block>>;
}

#[async_trait]
impl<T: BlockExistenceOracle + ?Sized> BlockExistenceOracle for Arc<T> {
    async fn find_blocks_by_node_and_time_range(
        &self,
        node_position: u32,
        start: Timestamp,
        end: Timestamp,
    ) -> OracleResult<Vec<BlockRef>> {
        (**self)
            .find_blocks_by_node_and_time_range(node_position, start, end)
            .await
    }
}

#[async_trait]
impl<T: BlockSource + ?Sized> BlockSource for Arc<T> {
    async fn block(&self, id: u64) -> OracleResult<Option<Block>> {
        (**self).block(id).await
    }

    async fn last_block(&self) -> OracleResult<Option<Block>> {
        (**self).last_block().await
    }
}
