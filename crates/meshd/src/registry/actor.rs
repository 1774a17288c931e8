//! Roster actor - owns the node's membership state and processes commands.
//!
//! The RosterActor is the single owner of the roster, the node's ID and its
//! join-protocol state. It receives commands via an mpsc channel and
//! publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are ignored, never panicked on

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use mesh_core::{MembershipView, NodeId, NodeState, PeerAddr, Roster};

use super::commands::{Admission, NodeEvent, RosterCommand, RosterError};

/// The roster actor.
///
/// Runs in a single task and processes commands sequentially, so two
/// concurrent join requests can never observe the same maximum ID.
pub struct RosterActor {
    /// Command receiver
    receiver: mpsc::Receiver<RosterCommand>,

    state: NodeState,

    /// Assigned ID, `None` until registered
    id: Option<NodeId>,

    /// Authoritative on the coordinator, a cached snapshot elsewhere
    roster: Roster,

    /// Newest roster update that arrived before our join response
    pending: Option<Roster>,

    is_coordinator: bool,

    /// Event publisher for subscribers
    event_publisher: broadcast::Sender<NodeEvent>,
}

impl RosterActor {
    /// Creates the coordinator's actor: ID 1, roster seeded with itself,
    /// already `Registered`.
    pub fn coordinator(
        receiver: mpsc::Receiver<RosterCommand>,
        event_publisher: broadcast::Sender<NodeEvent>,
        addr: PeerAddr,
    ) -> Self {
        Self {
            receiver,
            state: NodeState::Registered,
            id: Some(NodeId::COORDINATOR),
            roster: Roster::seeded(addr),
            pending: None,
            is_coordinator: true,
            event_publisher,
        }
    }

    /// Creates a member's actor: no ID, empty roster, `Unregistered`.
    pub fn member(
        receiver: mpsc::Receiver<RosterCommand>,
        event_publisher: broadcast::Sender<NodeEvent>,
    ) -> Self {
        Self {
            receiver,
            state: NodeState::Unregistered,
            id: None,
            roster: Roster::new(),
            pending: None,
            is_coordinator: false,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!(
            coordinator = self.is_coordinator,
            state = %self.state,
            "Roster actor starting"
        );

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.roster.len(), "Roster actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RosterCommand) {
        match cmd {
            RosterCommand::Admit { addr, respond_to } => {
                let result = self.handle_admit(addr);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RosterCommand::BeginJoin { respond_to } => {
                let _ = respond_to.send(self.handle_begin_join());
            }
            RosterCommand::CompleteRegistration {
                id,
                roster,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_complete_registration(id, roster));
            }
            RosterCommand::ReplaceRoster { roster, respond_to } => {
                let _ = respond_to.send(self.handle_replace_roster(roster));
            }
            RosterCommand::GetMembership { respond_to } => {
                let _ = respond_to.send(self.membership());
            }
        }
    }

    fn handle_admit(&mut self, addr: PeerAddr) -> Result<Admission, RosterError> {
        if !self.is_coordinator {
            return Err(RosterError::NotCoordinator);
        }

        let id = self
            .roster
            .admit(addr.clone())
            .ok_or(RosterError::IdSpaceExhausted)?;

        info!(id = %id, addr = %addr, members = self.roster.len(), "Member admitted");

        let _ = self.event_publisher.send(NodeEvent::MemberAdmitted {
            id,
            addr: addr.clone(),
        });

        Ok(Admission {
            id,
            addr,
            roster: self.roster.clone(),
        })
    }

    fn handle_begin_join(&mut self) -> Result<(), RosterError> {
        match (self.state, self.id) {
            (NodeState::Unregistered, _) => {
                self.state = NodeState::AwaitingRegistration;
                debug!("Awaiting registration");
                Ok(())
            }
            (NodeState::Registered, Some(id)) => Err(RosterError::AlreadyRegistered { id }),
            (actual, _) => Err(RosterError::UnexpectedState {
                expected: NodeState::Unregistered,
                actual,
            }),
        }
    }

    fn handle_complete_registration(
        &mut self,
        id: NodeId,
        roster: Roster,
    ) -> Result<(), RosterError> {
        if let Some(current) = self.id {
            warn!(current = %current, offered = %id, "Ignoring join response, already registered");
            return Err(RosterError::AlreadyRegistered { id: current });
        }

        if self.state != NodeState::AwaitingRegistration {
            return Err(RosterError::UnexpectedState {
                expected: NodeState::AwaitingRegistration,
                actual: self.state,
            });
        }

        // Updates and the join response travel on separate connections
        let roster = match self.pending.take() {
            Some(newer) if roster.is_superseded_by(&newer) => {
                debug!(
                    delivered = roster.len(),
                    buffered = newer.len(),
                    "Adopting roster update received ahead of join response"
                );
                newer
            }
            _ => roster,
        };

        if !roster.contains(id) {
            warn!(id = %id, "Join response roster does not list our own ID");
        }

        self.id = Some(id);
        self.roster = roster;
        self.state = NodeState::Registered;

        info!(id = %id, members = self.roster.len(), "Registration complete");

        let _ = self.event_publisher.send(NodeEvent::Registered {
            id,
            roster: self.roster.clone(),
        });

        Ok(())
    }

    fn handle_replace_roster(&mut self, roster: Roster) -> Result<(), RosterError> {
        if self.is_coordinator {
            return Err(RosterError::AuthoritativeRoster);
        }

        match self.state {
            NodeState::Registered => {}
            NodeState::AwaitingRegistration => {
                let stale = self
                    .pending
                    .as_ref()
                    .is_some_and(|buffered| roster.is_superseded_by(buffered));
                if !stale {
                    debug!(members = roster.len(), "Buffering roster update until registered");
                    self.pending = Some(roster);
                }
                return Ok(());
            }
            NodeState::Unregistered => {
                return Err(RosterError::UnexpectedState {
                    expected: NodeState::Registered,
                    actual: self.state,
                });
            }
        }

        if roster.is_superseded_by(&self.roster) {
            debug!(
                cached = self.roster.len(),
                offered = roster.len(),
                "Ignoring stale roster update"
            );
            return Ok(());
        }

        debug!(
            before = self.roster.len(),
            after = roster.len(),
            "Cached roster replaced"
        );
        self.roster = roster;

        let _ = self.event_publisher.send(NodeEvent::RosterReplaced {
            roster: self.roster.clone(),
        });

        Ok(())
    }

    fn membership(&self) -> MembershipView {
        MembershipView {
            state: self.state,
            id: self.id,
            roster: self.roster.clone(),
            is_coordinator: self.is_coordinator,
        }
    }
}
