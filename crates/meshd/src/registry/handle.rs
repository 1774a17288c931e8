//! Client interface for interacting with the RosterActor.
//!
//! The `RosterHandle` is cheap to clone and is shared by the group listener,
//! the point-to-point listener, the console and the coordinator logic.
//! Channel errors are mapped to `RosterError::ChannelClosed`.

use tokio::sync::{broadcast, mpsc, oneshot};

use mesh_core::{MembershipView, NodeId, PeerAddr, Roster};

use super::commands::{Admission, NodeEvent, RosterCommand, RosterError};

/// Handle for interacting with the roster actor.
///
/// ```ignore
/// let admission = handle.admit(PeerAddr::new("localhost", 50011)).await?;
/// let view = handle.membership().await?;
///
/// let mut rx = handle.subscribe();
/// while let Ok(event) = rx.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct RosterHandle {
    sender: mpsc::Sender<RosterCommand>,
    event_sender: broadcast::Sender<NodeEvent>,
}

impl RosterHandle {
    pub fn new(
        sender: mpsc::Sender<RosterCommand>,
        event_sender: broadcast::Sender<NodeEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Admit a joining node and return its ID plus the updated roster.
    ///
    /// # Errors
    ///
    /// - `RosterError::NotCoordinator` if this node is not the coordinator
    /// - `RosterError::IdSpaceExhausted` if no further ID can be assigned
    /// - `RosterError::ChannelClosed` if the actor has shut down
    pub async fn admit(&self, addr: PeerAddr) -> Result<Admission, RosterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RosterCommand::Admit {
                addr,
                respond_to: tx,
            })
            .await
            .map_err(|_| RosterError::ChannelClosed)?;

        rx.await.map_err(|_| RosterError::ChannelClosed)?
    }

    /// Mark the node as awaiting registration before broadcasting a join request.
    pub async fn begin_join(&self) -> Result<(), RosterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RosterCommand::BeginJoin { respond_to: tx })
            .await
            .map_err(|_| RosterError::ChannelClosed)?;

        rx.await.map_err(|_| RosterError::ChannelClosed)?
    }

    /// Adopt the ID and roster carried by a join response.
    ///
    /// # Errors
    ///
    /// - `RosterError::AlreadyRegistered` if the node already holds an ID
    /// - `RosterError::UnexpectedState` if no join request is pending
    /// - `RosterError::ChannelClosed` if the actor has shut down
    pub async fn complete_registration(
        &self,
        id: NodeId,
        roster: Roster,
    ) -> Result<(), RosterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RosterCommand::CompleteRegistration {
                id,
                roster,
                respond_to: tx,
            })
            .await
            .map_err(|_| RosterError::ChannelClosed)?;

        rx.await.map_err(|_| RosterError::ChannelClosed)?
    }

    /// Replace the cached roster with the one from a roster update.
    pub async fn replace_roster(&self, roster: Roster) -> Result<(), RosterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RosterCommand::ReplaceRoster {
                roster,
                respond_to: tx,
            })
            .await
            .map_err(|_| RosterError::ChannelClosed)?;

        rx.await.map_err(|_| RosterError::ChannelClosed)?
    }

    /// Snapshot of the node's state, ID and roster.
    pub async fn membership(&self) -> Result<MembershipView, RosterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RosterCommand::GetMembership { respond_to: tx })
            .await
            .map_err(|_| RosterError::ChannelClosed)?;

        rx.await.map_err(|_| RosterError::ChannelClosed)
    }

    /// Subscribe to node events.
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.event_sender.subscribe()
    }

    /// Publisher used by the point-to-point listener for chat events.
    pub fn event_sender(&self) -> broadcast::Sender<NodeEvent> {
        self.event_sender.clone()
    }

    /// Returns `true` while the actor is still accepting commands.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
