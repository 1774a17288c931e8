//! Roster actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RosterActor`:
//! - `RosterCommand`: Commands sent to the actor
//! - `RosterError`: Errors that can occur during roster operations
//! - `NodeEvent`: Events published to subscribers (the console, tests)

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use mesh_core::{MembershipView, NodeId, NodeState, PeerAddr, Roster};

// ============================================================================
// Roster Commands
// ============================================================================

/// Commands sent to the roster actor.
///
/// Each command carries a oneshot channel for the response. Because the
/// actor handles one command at a time, every read-modify-write on the
/// roster is atomic with respect to every other.
#[derive(Debug)]
pub enum RosterCommand {
    /// Admit a joining node (coordinator only).
    ///
    /// Computes the next ID, inserts the entry, and returns the ID together
    /// with the roster snapshot taken right after the insert.
    ///
    /// # Errors
    /// - `RosterError::NotCoordinator` on any other node
    /// - `RosterError::IdSpaceExhausted` if no further ID exists
    Admit {
        /// Address the new member will be reached at
        addr: PeerAddr,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<Admission, RosterError>>,
    },

    /// Record that a join request is about to be broadcast.
    ///
    /// Moves `Unregistered` to `AwaitingRegistration`.
    BeginJoin {
        respond_to: oneshot::Sender<Result<(), RosterError>>,
    },

    /// Adopt the ID and roster from a `JoinResponse`.
    ///
    /// # Errors
    /// - `RosterError::AlreadyRegistered` if an ID is already held
    /// - `RosterError::UnexpectedState` if no join is pending
    CompleteRegistration {
        id: NodeId,
        roster: Roster,
        respond_to: oneshot::Sender<Result<(), RosterError>>,
    },

    /// Replace the cached roster from a `RosterUpdate`.
    ///
    /// Held back while a join is pending, and dropped if it is older than
    /// the roster already held.
    ///
    /// # Errors
    /// - `RosterError::AuthoritativeRoster` on the coordinator
    /// - `RosterError::UnexpectedState` if no join has been started
    ReplaceRoster {
        roster: Roster,
        respond_to: oneshot::Sender<Result<(), RosterError>>,
    },

    /// Snapshot of state, ID and roster.
    GetMembership {
        respond_to: oneshot::Sender<MembershipView>,
    },
}

/// Result of a successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// The newly assigned ID
    pub id: NodeId,
    /// Where the new member listens
    pub addr: PeerAddr,
    /// Full roster including the new member
    pub roster: Roster,
}

// ============================================================================
// Roster Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// Only the coordinator admits members.
    #[error("this node is not the coordinator")]
    NotCoordinator,

    /// The coordinator's roster is authoritative and is never replaced.
    #[error("the coordinator's roster cannot be replaced")]
    AuthoritativeRoster,

    /// No ID beyond the current maximum exists.
    #[error("member ID space exhausted")]
    IdSpaceExhausted,

    /// A registered node never changes ID.
    #[error("already registered as node {id}")]
    AlreadyRegistered { id: NodeId },

    /// Command arrived in a state that does not accept it.
    #[error("expected state '{expected}', node is '{actual}'")]
    UnexpectedState {
        expected: NodeState,
        actual: NodeState,
    },

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Node Events
// ============================================================================

/// Events published to subscribers.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// This node obtained its ID (coordinators never emit this).
    Registered { id: NodeId, roster: Roster },

    /// A `RosterUpdate` replaced the cached roster.
    RosterReplaced { roster: Roster },

    /// The coordinator admitted a new member.
    MemberAdmitted { id: NodeId, addr: PeerAddr },

    /// Chat text arrived on the point-to-point listener.
    ChatReceived {
        from: SocketAddr,
        text: String,
        received_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_error_display() {
        assert_eq!(
            RosterError::NotCoordinator.to_string(),
            "this node is not the coordinator"
        );
        assert_eq!(
            RosterError::AlreadyRegistered { id: NodeId::new(3) }.to_string(),
            "already registered as node 3"
        );
        assert_eq!(
            RosterError::UnexpectedState {
                expected: NodeState::AwaitingRegistration,
                actual: NodeState::Unregistered,
            }
            .to_string(),
            "expected state 'awaiting registration', node is 'unregistered'"
        );
        assert_eq!(RosterError::ChannelClosed.to_string(), "response channel closed");
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        let (tx, rx) = oneshot::channel::<Result<(), RosterError>>();
        drop(tx);
        assert!(rx.await.is_err());
    }
}
