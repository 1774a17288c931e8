//! Mesh Protocol - Wire payloads exchanged between nodes
//!
//! Two kinds of payload travel between nodes:
//! - control messages (join request/response, roster update, heartbeat)
//! - chat text, which is untagged and recognised only by not decoding as control
//!
//! Payloads are decoded exactly once, at the transport boundary, into
//! [`Inbound`].

pub mod message;
pub mod parse;

pub use message::{
    ControlMessage, DecodeError, EncodeError, HEARTBEAT_TOKEN, JOIN_REQUEST_TAG,
    ROSTER_UPDATE_TAG,
};
pub use parse::{format_chat, Inbound};
