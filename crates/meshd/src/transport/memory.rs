//! In-process group channel.
//!
//! Behaves like a multicast group with loopback enabled: every broadcast
//! reaches every endpoint that has joined, including the sender. Lets
//! several nodes share one process without touching OS multicast.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use mesh_core::{DeliveryError, TransportError};

use super::GroupTransport;

/// Datagrams buffered per endpoint before the slowest one starts lagging.
const GROUP_BUFFER: usize = 256;

/// First synthetic source port handed to an endpoint.
const FIRST_ENDPOINT_PORT: u16 = 40_000;

type Datagram = (Arc<[u8]>, SocketAddr);

/// Hub that endpoints join. Cheap to clone.
#[derive(Clone)]
pub struct MemoryGroup {
    sender: broadcast::Sender<Datagram>,
    next_port: Arc<AtomicU16>,
}

impl MemoryGroup {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(GROUP_BUFFER);
        Self {
            sender,
            next_port: Arc::new(AtomicU16::new(FIRST_ENDPOINT_PORT)),
        }
    }

    /// Subscribes a new endpoint. It sees every datagram sent from now on.
    pub fn join(&self) -> MemoryEndpoint {
        let port = self.next_port.fetch_add(1, Ordering::Relaxed);
        MemoryEndpoint {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            sender: self.sender.clone(),
            receiver: Mutex::new(self.sender.subscribe()),
        }
    }
}

impl Default for MemoryGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// One node's view of a [`MemoryGroup`].
pub struct MemoryEndpoint {
    addr: SocketAddr,
    sender: broadcast::Sender<Datagram>,
    receiver: Mutex<broadcast::Receiver<Datagram>>,
}

impl MemoryEndpoint {
    /// Source address other endpoints see on our datagrams.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl GroupTransport for MemoryEndpoint {
    async fn broadcast(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        // Our own receiver keeps the channel open, so this only fails if
        // nobody at all is listening, which is fine for a best-effort medium.
        let _ = self.sender.send((Arc::from(payload), self.addr));
        Ok(())
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut receiver = self.receiver.lock().await;
        loop {
            match receiver.recv().await {
                Ok((payload, from)) => return Ok((payload.to_vec(), from)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, addr = %self.addr, "Group endpoint lagged, datagrams dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(TransportError::GroupClosed("in-memory group dropped".to_string()));
                }
            }
        }
    }
}
