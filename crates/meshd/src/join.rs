//! Member side of the join handshake.

use thiserror::Error;
use tracing::info;

use mesh_core::DeliveryError;
use mesh_protocol::{ControlMessage, EncodeError};

use crate::registry::{RosterError, RosterHandle};
use crate::transport::GroupTransport;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("failed to broadcast join request: {0}")]
    Broadcast(#[from] DeliveryError),
}

/// Moves the node to `AwaitingRegistration` and broadcasts a join request
/// naming `reply_port`.
///
/// Sent once. If no coordinator answers, the node waits indefinitely.
pub async fn announce(
    roster: &RosterHandle,
    group: &dyn GroupTransport,
    reply_port: u16,
) -> Result<(), JoinError> {
    let request = ControlMessage::join_request(reply_port).encode()?;
    roster.begin_join().await?;
    group.broadcast(&request).await?;

    info!(reply_port, "Join request broadcast, awaiting registration");
    Ok(())
}
