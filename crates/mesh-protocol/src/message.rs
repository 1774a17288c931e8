//! Control message types and their JSON wire format.
//!
//! | Message        | Wire shape                                          |
//! |----------------|-----------------------------------------------------|
//! | `JoinRequest`  | `{"tag":"QUERO_ENTRAR","replyPort":50011}`          |
//! | `JoinResponse` | `{"id":2,"peers":{"1":["localhost",50010],...}}`    |
//! | `RosterUpdate` | `{"tag":"ROSTER_UPDATE","peers":{...}}`             |
//! | `Heartbeat`    | the bare token `VIVO`                               |
//!
//! `JoinResponse` carries no tag; it is recognised by the absence of one.

use mesh_core::{NodeId, Roster};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminant of a join announcement on the group channel.
pub const JOIN_REQUEST_TAG: &str = "QUERO_ENTRAR";

/// Discriminant of a roster broadcast from the coordinator.
pub const ROSTER_UPDATE_TAG: &str = "ROSTER_UPDATE";

/// Liveness token the coordinator broadcasts. Sent raw, not as JSON.
pub const HEARTBEAT_TOKEN: &str = "VIVO";

/// Every control message a node understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Group channel: an unregistered node asks to join, naming its listening port
    JoinRequest { reply_port: u16 },

    /// Point-to-point: the coordinator's answer, with the full roster snapshot
    JoinResponse { id: NodeId, peers: Roster },

    /// Point-to-point: the coordinator's full roster after an admission
    RosterUpdate { peers: Roster },

    /// Group channel: coordinator liveness signal
    Heartbeat,
}

// ----------------------------------------------------------------------------
// Wire representations
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "tag")]
enum TaggedWire {
    #[serde(rename = "QUERO_ENTRAR")]
    JoinRequest {
        #[serde(rename = "replyPort")]
        reply_port: u16,
    },

    #[serde(rename = "ROSTER_UPDATE")]
    RosterUpdate { peers: Roster },
}

#[derive(Debug, Serialize, Deserialize)]
struct JoinResponseWire {
    id: NodeId,
    peers: Roster,
}

/// Only the discriminant; every other field is ignored.
#[derive(Debug, Deserialize)]
struct TagOnly {
    #[serde(default)]
    tag: Option<String>,
}

impl ControlMessage {
    /// Creates a join request.
    pub fn join_request(reply_port: u16) -> Self {
        Self::JoinRequest { reply_port }
    }

    /// Creates a join response.
    pub fn join_response(id: NodeId, peers: Roster) -> Self {
        Self::JoinResponse { id, peers }
    }

    /// Creates a roster update.
    pub fn roster_update(peers: Roster) -> Self {
        Self::RosterUpdate { peers }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRequest { .. } => "join_request",
            Self::JoinResponse { .. } => "join_response",
            Self::RosterUpdate { .. } => "roster_update",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Serializes to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let encoded = match self {
            Self::JoinRequest { reply_port } => serde_json::to_vec(&TaggedWire::JoinRequest {
                reply_port: *reply_port,
            }),
            Self::RosterUpdate { peers } => serde_json::to_vec(&TaggedWire::RosterUpdate {
                peers: peers.clone(),
            }),
            Self::JoinResponse { id, peers } => serde_json::to_vec(&JoinResponseWire {
                id: *id,
                peers: peers.clone(),
            }),
            Self::Heartbeat => return Ok(HEARTBEAT_TOKEN.as_bytes().to_vec()),
        };

        encoded.map_err(|e| EncodeError {
            kind: self.kind(),
            reason: e.to_string(),
        })
    }

    /// Decodes wire bytes into a control message.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` for anything that is not a control message.
    /// Callers on the point-to-point channel treat that as chat text.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        if payload == HEARTBEAT_TOKEN.as_bytes() {
            return Ok(Self::Heartbeat);
        }

        let head: TagOnly =
            serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match head.tag.as_deref() {
            Some(JOIN_REQUEST_TAG) | Some(ROSTER_UPDATE_TAG) => {
                let wire: TaggedWire =
                    serde_json::from_slice(payload).map_err(|e| DecodeError::Invalid {
                        kind: "tagged control message",
                        reason: e.to_string(),
                    })?;
                Ok(match wire {
                    TaggedWire::JoinRequest { reply_port } => Self::JoinRequest { reply_port },
                    TaggedWire::RosterUpdate { peers } => Self::RosterUpdate { peers },
                })
            }
            Some(other) => Err(DecodeError::UnknownTag(other.to_string())),
            None => {
                let wire: JoinResponseWire =
                    serde_json::from_slice(payload).map_err(|e| DecodeError::Invalid {
                        kind: "join response",
                        reason: e.to_string(),
                    })?;
                Ok(Self::JoinResponse {
                    id: wire.id,
                    peers: wire.peers,
                })
            }
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A payload that is not a control message. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("payload is not a JSON object: {0}")]
    Malformed(String),

    #[error("unknown control tag: {0}")]
    UnknownTag(String),

    #[error("invalid {kind}: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

/// A control message could not be serialized.
#[derive(Debug, Clone, Error)]
#[error("failed to encode {kind}: {reason}")]
pub struct EncodeError {
    pub kind: &'static str,
    pub reason: String,
}
