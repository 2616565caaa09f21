//! Integration tests for the confirmation responder

use std::sync::Arc;

use async_trait::async_trait;
use meridian::{confirm, ConfirmationResponder, RESPONSE_SIZE};
use meridian_core::{BlockSource, OracleError, OracleResult};
use meridian_storage::{BlockStore, MemoryBlockStore};
use meridian_types::{Block, Timestamp};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

const ZERO: [u8; RESPONSE_SIZE] = [0u8; RESPONSE_SIZE];

fn store_with_blocks() -> (MemoryBlockStore, Block) {
    let store = MemoryBlockStore::new();
    let block = Block::new(3, 1, Timestamp::from_millis(20_000), vec!["{}".into()]);
    store.put_block(&block).unwrap();

    let mut bare = Block::new(4, 2, Timestamp::from_millis(30_000), vec![]);
    bare.hash.clear();
    store.put_block(&bare).unwrap();

    (store, block)
}

/// Source whose backend is down.
struct Broken;

#[async_trait]
impl BlockSource for Broken {
    async fn block(&self, _id: u64) -> OracleResult<Option<Block>> {
        Err(OracleError::Unavailable("disk gone".into()))
    }

    async fn last_block(&self) -> OracleResult<Option<Block>> {
        Err(OracleError::Unavailable("disk gone".into()))
    }
}

#[tokio::test]
async fn test_confirm_known_block() {
    let (store, block) = store_with_blocks();
    let response = confirm(&store, 3u32.to_be_bytes()).await;
    assert_eq!(&response[..], &block.hash[..]);
}

#[tokio::test]
async fn test_confirm_sentinels() {
    let (store, _) = store_with_blocks();

    // unknown block
    assert_eq!(confirm(&store, 99u32.to_be_bytes()).await, ZERO);
    // stored without a hash
    assert_eq!(confirm(&store, 4u32.to_be_bytes()).await, ZERO);
    // storage failure
    assert_eq!(confirm(&Broken, 3u32.to_be_bytes()).await, ZERO);
}

#[tokio::test]
async fn test_responder_answers_over_tcp() {
    let (store, block) = store_with_blocks();
    let responder = ConfirmationResponder::bind("127.0.0.1:0".parse().unwrap(), Arc::new(store))
        .await
        .unwrap();
    let addr = responder.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server = tokio::spawn(responder.run(shutdown_rx));

    let mut stream = TcpStream::connect(addr).await.unwrap();

    // several requests on one connection
    for (id, expected) in [(3u32, block.hash.clone()), (99u32, ZERO.to_vec())] {
        stream.write_all(&id.to_be_bytes()).await.unwrap();
        let mut response = [0u8; RESPONSE_SIZE];
        stream.read_exact(&mut response).await.unwrap();
        assert_eq!(response.to_vec(), expected, "block {}", id);
    }
    drop(stream);

    shutdown_tx.send(()).unwrap();
    server.await.unwrap();
}
