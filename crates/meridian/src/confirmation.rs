//! Block confirmation responder
//!
//! Peers ask whether this node holds a block and which hash it has for it.
//!
//! ```text
//! request:  block id   (4 bytes, big-endian u32)
//! response: block hash (32 bytes)
//! ```
//!
//! A connection may carry any number of requests; each is answered in order.
//! The all-zero hash means "not known here": the block is missing, was stored
//! without a hash, or the store could not be read.

use meridian_core::BlockSource;
use meridian_types::H256;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Request size in bytes
pub const REQUEST_SIZE: usize = 4;

/// Response size in bytes
pub const RESPONSE_SIZE: usize = 32;

/// Hash this node reports for block `request`.
pub async fn confirm<S>(source: &S, request: [u8; REQUEST_SIZE]) -> [u8; RESPONSE_SIZE]
where
    S: BlockSource + ?Sized,
{
    let id = u64::from(u32::from_be_bytes(request));
    let hash = match source.block(id).await {
        Ok(Some(block)) => block.hash(),
        Ok(None) => None,
        Err(e) => {
            warn!(block_id = id, error = %e, "Block lookup failed, answering with empty hash");
            None
        }
    };

    let mut response = [0u8; RESPONSE_SIZE];
    if let Some(hash) = hash {
        response.copy_from_slice(hash.as_bytes());
    }
    debug!(block_id = id, hash = %H256::from(response), "Confirmation answered");
    response
}

/// TCP server answering confirmation requests.
pub struct ConfirmationResponder<S> {
    listener: TcpListener,
    source: Arc<S>,
}

impl<S> ConfirmationResponder<S>
where
    S: BlockSource + 'static,
{
    /// Bind to `addr`.
    pub async fn bind(addr: SocketAddr, source: Arc<S>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, source })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let addr = self.local_addr().ok();
        info!(addr = ?addr, "Confirmation responder listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let source = Arc::clone(&self.source);
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, source.as_ref()).await {
                                    debug!(peer = %peer, error = %e, "Confirmation connection closed with error");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "Failed to accept confirmation connection"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Confirmation responder shutting down");
                    break;
                }
            }
        }
    }
}

async fn serve_connection<S>(mut stream: TcpStream, source: &S) -> io::Result<()>
where
    S: BlockSource + ?Sized,
{
    let mut request = [0u8; REQUEST_SIZE];
    loop {
        match stream.read_exact(&mut request).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        let response = confirm(source, request).await;
        stream.write_all(&response).await?;
    }
}
