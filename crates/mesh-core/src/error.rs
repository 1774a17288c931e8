//! Transport error types following panic-free policy.

use thiserror::Error;

use crate::PeerAddr;

/// Endpoint setup failures. Fatal: a node that cannot bind its listener
/// or join the group channel does not start.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Could not bind the point-to-point listener
    #[error("Failed to bind listener on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// Could not open or join the group channel
    #[error("Failed to join group channel {group}: {reason}")]
    GroupSetup { group: String, reason: String },

    /// A receive on the group channel failed; the channel may recover
    #[error("Failed to receive on group channel: {0}")]
    GroupReceive(String),

    /// The group channel is gone for good
    #[error("Group channel closed: {0}")]
    GroupClosed(String),
}

/// A send to one specific peer failed.
///
/// Recovered locally by skipping that peer. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Connection refused or host unresolvable
    #[error("Failed to connect to {peer}: {reason}")]
    Connect { peer: PeerAddr, reason: String },

    /// Connect or write did not finish in time
    #[error("Timed out delivering to {peer} after {timeout_ms} ms")]
    Timeout { peer: PeerAddr, timeout_ms: u64 },

    /// Connected, but the payload could not be written
    #[error("Failed to send to {peer}: {reason}")]
    Send { peer: PeerAddr, reason: String },

    /// Broadcast on the group channel failed
    #[error("Failed to broadcast on group channel: {0}")]
    Broadcast(String),
}

impl DeliveryError {
    /// The peer this failure concerns, if it was a point-to-point send.
    pub fn peer(&self) -> Option<&PeerAddr> {
        match self {
            Self::Connect { peer, .. } | Self::Timeout { peer, .. } | Self::Send { peer, .. } => {
                Some(peer)
            }
            Self::Broadcast(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::Connect {
            peer: PeerAddr::new("localhost", 50011),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to connect to localhost:50011: connection refused"
        );

        let err = DeliveryError::Timeout {
            peer: PeerAddr::new("localhost", 50012),
            timeout_ms: 2000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out delivering to localhost:50012 after 2000 ms"
        );
    }

    #[test]
    fn test_delivery_error_peer() {
        let peer = PeerAddr::new("h", 1);
        let err = DeliveryError::Send {
            peer: peer.clone(),
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.peer(), Some(&peer));
        assert_eq!(DeliveryError::Broadcast("x".to_string()).peer(), None);
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Bind {
            addr: "localhost:50010".to_string(),
            reason: "address in use".to_string(),
        };
        assert!(err.to_string().contains("localhost:50010"));
        assert!(err.to_string().contains("address in use"));
    }
}
