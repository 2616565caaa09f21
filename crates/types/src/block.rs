//! Block types.
//!
//! - [`Block`] - a stored block: producer position, generation time and the
//!   canonical transaction payloads it carries
//! - [`BlockRef`] - the lightweight view returned by existence queries

use crate::{Timestamp, H256};
use serde::{Deserialize, Serialize};

/// A block as persisted by the node.
///
/// `hash` is kept as raw bytes because blocks imported from older stores may
/// carry an empty hash; readers must treat an empty hash as "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Sequential block id (genesis is 1)
    pub id: u64,
    /// Block hash, possibly empty
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    /// Round-robin position of the producing node
    pub node_position: u32,
    /// Generation time
    pub time: Timestamp,
    /// Canonical transaction payloads, in execution order
    pub transactions: Vec<String>,
}

impl Block {
    /// Creates a block and computes its hash.
    pub fn new(id: u64, node_position: u32, time: Timestamp, transactions: Vec<String>) -> Self {
        let mut block = Self {
            id,
            hash: Vec::new(),
            node_position,
            time,
            transactions,
        };
        block.hash = block.compute_hash().as_bytes().to_vec();
        block
    }

    /// Keccak256 over id, producer position, time and every payload.
    pub fn compute_hash(&self) -> H256 {
        let id = self.id.to_be_bytes();
        let position = self.node_position.to_be_bytes();
        let time = self.time.as_millis().to_be_bytes();
        let mut parts: Vec<&[u8]> = vec![&id, &position, &time];
        for tx in &self.transactions {
            parts.push(tx.as_bytes());
        }
        H256::keccak256_concat(&parts)
    }

    /// Returns the hash as [`H256`], or `None` if it is empty or malformed.
    pub fn hash(&self) -> Option<H256> {
        H256::from_slice(&self.hash).ok()
    }

    /// Returns the reference view of this block.
    pub fn to_ref(&self) -> BlockRef {
        BlockRef {
            id: self.id,
            hash: self.hash.clone(),
            node_position: self.node_position,
            time: self.time,
        }
    }
}

/// Reference to a stored block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block id
    pub id: u64,
    /// Block hash, possibly empty
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    /// Producer position
    pub node_position: u32,
    /// Generation time
    pub time: Timestamp,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
