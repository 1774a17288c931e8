//! Node identity, addressing, and registration state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::roster::Roster;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Membership identifier assigned by the coordinator.
///
/// IDs are positive and dense: the coordinator is always `1` and every
/// admitted member receives the current maximum plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The statically assigned coordinator ID.
    pub const COORDINATOR: NodeId = NodeId(1);

    /// Creates a NodeId from its raw value.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw integer value.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the ID following this one, or `None` on overflow.
    #[must_use]
    pub fn next(self) -> Option<NodeId> {
        self.0.checked_add(1).map(NodeId)
    }

    /// Returns true if this is the coordinator's ID.
    #[must_use]
    pub fn is_coordinator(self) -> bool {
        self == Self::COORDINATOR
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Point-to-point address of a node: host name (or IP literal) and TCP port.
///
/// On the wire this is a two-element array `["host", port]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<(String, u16)> for PeerAddr {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<PeerAddr> for (String, u16) {
    fn from(addr: PeerAddr) -> Self {
        (addr.host, addr.port)
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Registration State
// ============================================================================

/// Where a node is in the join protocol.
///
/// ```text
/// Unregistered ──JoinRequest sent──▶ AwaitingRegistration ──JoinResponse──▶ Registered
/// ```
///
/// The coordinator starts directly in `Registered`. There is no way back:
/// a registered node keeps its ID for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    #[default]
    Unregistered,
    AwaitingRegistration,
    Registered,
}

impl NodeState {
    /// Returns the display label for this state.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::AwaitingRegistration => "awaiting registration",
            Self::Registered => "registered",
        }
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only snapshot of a node's membership, safe to hand across tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipView {
    pub state: NodeState,
    /// Assigned ID; `None` until registered.
    pub id: Option<NodeId>,
    /// Authoritative roster on the coordinator, cached snapshot elsewhere.
    pub roster: Roster,
    pub is_coordinator: bool,
}
