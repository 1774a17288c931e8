//! UDP multicast group channel.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use mesh_core::{DeliveryError, TransportError};

use super::GroupTransport;
use crate::config::GroupConfig;

/// Largest datagram we will receive.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Multicast subscription shared by every node on the host.
///
/// The socket is bound with `SO_REUSEADDR` so several nodes on one machine
/// can listen on the same group port.
pub struct MulticastGroup {
    socket: UdpSocket,
    destination: SocketAddrV4,
}

impl MulticastGroup {
    /// Binds the group port and joins the multicast group.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: &GroupConfig) -> Result<Self, TransportError> {
        let destination = SocketAddrV4::new(config.address, config.port);
        let setup_err = |e: std::io::Error| TransportError::GroupSetup {
            group: destination.to_string(),
            reason: e.to_string(),
        };

        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(setup_err)?;
        socket.set_reuse_address(true).map_err(setup_err)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
        socket.bind(&bind_addr.into()).map_err(setup_err)?;
        socket
            .join_multicast_v4(&config.address, &config.interface)
            .map_err(setup_err)?;
        socket
            .set_multicast_loop_v4(config.loopback)
            .map_err(setup_err)?;
        socket.set_multicast_ttl_v4(config.ttl).map_err(setup_err)?;
        socket.set_nonblocking(true).map_err(setup_err)?;

        let socket = UdpSocket::from_std(socket.into()).map_err(setup_err)?;

        info!(
            group = %destination,
            interface = %config.interface,
            "Joined multicast group"
        );

        Ok(Self {
            socket,
            destination,
        })
    }
}

#[async_trait]
impl GroupTransport for MulticastGroup {
    async fn broadcast(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        self.socket
            .send_to(payload, self.destination)
            .await
            .map_err(|e| DeliveryError::Broadcast(e.to_string()))?;

        debug!(group = %self.destination, bytes = payload.len(), "Broadcast datagram");
        Ok(())
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| TransportError::GroupReceive(e.to_string()))?;
        buf.truncate(len);
        Ok((buf, from))
    }
}
