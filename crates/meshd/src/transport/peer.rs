//! One-shot TCP delivery.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use mesh_core::{DeliveryError, PeerAddr};

use super::PeerSender;
use crate::config::{duration_ms, NodeConfig};

/// Opens a fresh connection per payload. No pooling, no retries.
///
/// Both the connect and the write are bounded so an unresponsive peer
/// cannot stall the caller.
#[derive(Debug, Clone)]
pub struct TcpPeerSender {
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpPeerSender {
    pub fn new(connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            write_timeout,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.connect_timeout(), config.io_timeout())
    }
}

#[async_trait]
impl PeerSender for TcpPeerSender {
    async fn send(&self, peer: &PeerAddr, payload: &[u8]) -> Result<(), DeliveryError> {
        let connect = TcpStream::connect((peer.host.as_str(), peer.port));
        let mut stream = match timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(DeliveryError::Connect {
                    peer: peer.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(DeliveryError::Timeout {
                    peer: peer.clone(),
                    timeout_ms: duration_ms(self.connect_timeout),
                })
            }
        };

        let write = async {
            stream.write_all(payload).await?;
            stream.shutdown().await
        };

        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {
                debug!(peer = %peer, bytes = payload.len(), "Delivered payload");
                Ok(())
            }
            Ok(Err(e)) => Err(DeliveryError::Send {
                peer: peer.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DeliveryError::Timeout {
                peer: peer.clone(),
                timeout_ms: duration_ms(self.write_timeout),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn sender() -> TcpPeerSender {
        TcpPeerSender::new(Duration::from_secs(1), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_send_delivers_one_payload_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            // read_to_end only returns once the sender has closed its half
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        sender()
            .send(&PeerAddr::new("127.0.0.1", port), b"[ID 1] hi")
            .await
            .unwrap();

        assert_eq!(reader.await.unwrap(), b"[ID 1] hi");
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_connect_error() {
        // Bind then drop to find a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let peer = PeerAddr::new("127.0.0.1", port);
        let err = sender().send(&peer, b"x").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Connect { .. }));
        assert_eq!(err.peer(), Some(&peer));
    }
}
