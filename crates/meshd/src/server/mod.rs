//! Point-to-point TCP listener.
//!
//! The server:
//! - Listens on the node's configured port
//! - Spawns a ConnectionHandler per inbound connection on the shared TaskTracker
//! - Stops accepting when the CancellationToken fires
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   PeerServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RosterHandle   │
//! │ (one payload)   │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ NodeEvent::ChatReceived
//!         ▼
//!    subscribers
//! ```
//!
//! Accept errors are logged and the loop keeps going.

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use mesh_core::TransportError;

use crate::registry::RosterHandle;

/// Limits applied to every inbound connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Time allowed to receive the whole payload
    pub read_timeout: Duration,
    /// Larger payloads are dropped
    pub max_payload_bytes: usize,
}

/// Listener for JoinResponse, RosterUpdate and chat payloads.
pub struct PeerServer {
    listener: TcpListener,
    local_port: u16,
    limits: ConnectionLimits,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
}

impl PeerServer {
    /// Binds `host:port`. Port 0 picks an ephemeral port.
    ///
    /// # Errors
    ///
    /// `TransportError::Bind` if the address cannot be resolved or bound.
    /// This is fatal for node startup.
    pub async fn bind(
        host: &str,
        port: u16,
        limits: ConnectionLimits,
        cancel_token: CancellationToken,
        tracker: TaskTracker,
    ) -> Result<Self, TransportError> {
        let bind_err = |e: std::io::Error| TransportError::Bind {
            addr: format!("{host}:{port}"),
            reason: e.to_string(),
        };

        let listener = TcpListener::bind((host, port)).await.map_err(bind_err)?;
        let local_port = listener.local_addr().map_err(bind_err)?.port();

        info!(host = %host, port = local_port, "Peer listener bound");

        Ok(Self {
            listener,
            local_port,
            limits,
            cancel_token,
            tracker,
        })
    }

    /// The port actually bound.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Accepts connections until the cancellation token is triggered.
    ///
    /// Payloads are dispatched to `roster`.
    pub async fn run(self, roster: RosterHandle) {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Peer listener shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, from)) => {
                            debug!(from = %from, "Inbound connection");
                            self.handle_connection(stream, from, &roster);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    fn handle_connection(
        &self,
        stream: tokio::net::TcpStream,
        from: std::net::SocketAddr,
        roster: &RosterHandle,
    ) {
        let handler = ConnectionHandler::new(stream, from, roster.clone(), self.limits);
        let cancel_token = self.cancel_token.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!(from = %from, "Connection dropped on shutdown");
                }
                _ = handler.run() => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{spawn_roster, Role};

    fn limits() -> ConnectionLimits {
        ConnectionLimits {
            read_timeout: Duration::from_secs(1),
            max_payload_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = PeerServer::bind(
            "127.0.0.1",
            0,
            limits(),
            CancellationToken::new(),
            TaskTracker::new(),
        )
        .await
        .unwrap();

        assert_ne!(server.local_port(), 0);
    }

    #[tokio::test]
    async fn test_bind_port_in_use_is_transport_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = PeerServer::bind(
            "127.0.0.1",
            port,
            limits(),
            CancellationToken::new(),
            TaskTracker::new(),
        )
        .await;

        match result {
            Err(TransportError::Bind { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{port}")),
            Err(other) => panic!("Expected Bind error, got {other:?}"),
            Ok(_) => panic!("Expected Bind error, got a server"),
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let server = PeerServer::bind(
            "127.0.0.1",
            0,
            limits(),
            cancel.clone(),
            TaskTracker::new(),
        )
        .await
        .unwrap();

        let task = tokio::spawn(server.run(spawn_roster(Role::Member)));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
