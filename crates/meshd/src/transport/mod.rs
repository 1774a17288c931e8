//! The two channels a node talks over.
//!
//! - [`GroupTransport`]: best-effort datagrams to every subscriber of a shared
//!   rendezvous address. Used only for join announcements and heartbeats.
//! - [`PeerSender`]: reliable one-shot delivery to a single addressed peer
//!   (open, send one payload, close). Used for registration, roster updates
//!   and chat.
//!
//! The inbound half of the point-to-point channel is the listener in
//! [`crate::server`].

use std::net::SocketAddr;

use async_trait::async_trait;

use mesh_core::{DeliveryError, PeerAddr, TransportError};

mod group;
mod memory;
mod peer;

pub use group::{MulticastGroup, MAX_DATAGRAM_SIZE};
pub use memory::{MemoryEndpoint, MemoryGroup};
pub use peer::TcpPeerSender;

/// Shared broadcast medium.
///
/// No ordering, no delivery guarantee, no sender authentication.
#[async_trait]
pub trait GroupTransport: Send + Sync {
    /// Sends `payload` to every subscriber. Fire-and-forget.
    async fn broadcast(&self, payload: &[u8]) -> Result<(), DeliveryError>;

    /// Waits for the next datagram and its sender address.
    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError>;
}

/// Outbound half of the point-to-point channel.
#[async_trait]
pub trait PeerSender: Send + Sync {
    /// Opens a connection to `peer`, writes `payload`, and closes it.
    ///
    /// The connection is released on every path, including failure.
    async fn send(&self, peer: &PeerAddr, payload: &[u8]) -> Result<(), DeliveryError>;
}
