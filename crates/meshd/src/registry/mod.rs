//! Membership state using the Actor pattern.
//!
//! Every node owns exactly one roster actor. It holds the node's ID, its
//! join-protocol state and the roster (authoritative on the coordinator, a
//! cached copy everywhere else). All mutations go through the actor's
//! command channel, so concurrent join requests are serialized.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ Group listener  │────▶│   RosterActor   │────▶│ Broadcast Channel│
//! │ Peer listener   │     └─────────────────┘     └──────────────────┘
//! │ Console         │             │                        │
//! └─────────────────┘             │   NodeEvent            │
//!     RosterCommand               ▼                        ▼
//!     (mpsc channel)       state, id, Roster          console, tests
//! ```

use tokio::sync::{broadcast, mpsc};

use mesh_core::PeerAddr;

mod actor;
mod commands;
mod handle;

pub use actor::RosterActor;
pub use commands::{Admission, NodeEvent, RosterCommand, RosterError};
pub use handle::RosterHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// The role a node starts in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// ID 1. Seeds the roster with its own listening address.
    Coordinator { addr: PeerAddr },
    /// Must join through the group before it has an ID.
    Member,
}

/// Spawn the roster actor and return a handle for interaction.
///
/// The actor stops once every handle has been dropped.
///
/// ```no_run
/// use meshd::registry::{spawn_roster, Role};
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_roster(Role::Member);
///     let view = handle.membership().await;
/// }
/// ```
pub fn spawn_roster(role: Role) -> RosterHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = match role {
        Role::Coordinator { addr } => RosterActor::coordinator(cmd_rx, event_tx.clone(), addr),
        Role::Member => RosterActor::member(cmd_rx, event_tx.clone()),
    };
    tokio::spawn(actor.run());

    RosterHandle::new(cmd_tx, event_tx)
}
