//! Handler for one inbound point-to-point connection.
//!
//! Each connection carries exactly one payload: the handler reads until the
//! peer closes its half, decodes once, dispatches, and drops the stream.
//! Errors are logged and never reach the sender.

use std::net::SocketAddr;

use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use mesh_protocol::{ControlMessage, Inbound};

use super::ConnectionLimits;
use crate::registry::{NodeEvent, RosterError, RosterHandle};

/// Reads and dispatches a single payload.
pub struct ConnectionHandler {
    stream: TcpStream,
    from: SocketAddr,
    roster: RosterHandle,
    limits: ConnectionLimits,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        from: SocketAddr,
        roster: RosterHandle,
        limits: ConnectionLimits,
    ) -> Self {
        Self {
            stream,
            from,
            roster,
            limits,
        }
    }

    /// Runs the handler to completion. The stream is closed on return.
    pub async fn run(mut self) {
        let from = self.from;
        let result = match self.read_payload().await {
            Ok(payload) => self.dispatch(Inbound::parse(&payload)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {}
            Err(ConnectionError::Empty) => trace!(from = %from, "Connection closed without payload"),
            Err(e @ ConnectionError::Roster(_)) => debug!(from = %from, error = %e, "Payload rejected"),
            Err(e) => warn!(from = %from, error = %e, "Dropped inbound payload"),
        }
    }

    async fn read_payload(&mut self) -> Result<Vec<u8>, ConnectionError> {
        let max = self.limits.max_payload_bytes;
        let limit = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);
        let mut buf = Vec::new();

        let mut limited = (&mut self.stream).take(limit);
        match timeout(self.limits.read_timeout, limited.read_to_end(&mut buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ConnectionError::Io(e.to_string())),
            Err(_) => return Err(ConnectionError::Timeout),
        }

        if buf.len() > max {
            return Err(ConnectionError::PayloadTooLarge { max });
        }
        if buf.is_empty() {
            return Err(ConnectionError::Empty);
        }
        Ok(buf)
    }

    async fn dispatch(&self, inbound: Inbound) -> Result<(), ConnectionError> {
        match inbound {
            Inbound::Control(ControlMessage::JoinResponse { id, peers }) => {
                self.roster.complete_registration(id, peers).await?;
            }
            Inbound::Control(ControlMessage::RosterUpdate { peers }) => {
                self.roster.replace_roster(peers).await?;
            }
            Inbound::Control(other) => {
                // Join requests and heartbeats belong on the group channel
                debug!(from = %self.from, kind = other.kind(), "Ignoring group message on peer listener");
            }
            Inbound::Chat(text) => {
                info!(from = %self.from, text = %text, "Chat received");
                let _ = self.roster.event_sender().send(NodeEvent::ChatReceived {
                    from: self.from,
                    text,
                    received_at: Utc::now(),
                });
            }
        }
        Ok(())
    }
}

/// Reasons an inbound payload was dropped.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("timed out waiting for payload")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("payload exceeds {max} bytes")]
    PayloadTooLarge { max: usize },

    #[error("empty payload")]
    Empty,

    #[error("roster rejected payload: {0}")]
    Roster(#[from] RosterError),
}
