//! Single-pass interpretation of received payloads.

use mesh_core::NodeId;
use tracing::trace;

use crate::message::ControlMessage;

/// A received payload, decoded once at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Control(ControlMessage),
    /// Anything that did not decode as a control message
    Chat(String),
}

impl Inbound {
    /// Classifies a payload. Never fails: undecodable payloads become chat.
    ///
    /// Invalid UTF-8 in chat text is replaced rather than rejected.
    pub fn parse(payload: &[u8]) -> Self {
        match ControlMessage::decode(payload) {
            Ok(msg) => Self::Control(msg),
            Err(e) => {
                trace!(error = %e, "Payload is not a control message, treating as chat");
                Self::Chat(String::from_utf8_lossy(payload).into_owned())
            }
        }
    }
}

/// Formats outgoing chat text with the author's ID prefix: `[ID 2] hello`.
pub fn format_chat(author: NodeId, text: &str) -> String {
    format!("[ID {author}] {text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_fallback() {
        let inbound = Inbound::parse(b"[ID 3] hello there");
        assert_eq!(inbound, Inbound::Chat("[ID 3] hello there".to_string()));
    }

    #[test]
    fn test_malformed_control_becomes_chat() {
        let payload = br#"{"id": "not a number"}"#;
        assert_eq!(
            Inbound::parse(payload),
            Inbound::Chat(r#"{"id": "not a number"}"#.to_string())
        );
    }

    #[test]
    fn test_control_payload() {
        let payload = ControlMessage::join_request(50020).encode().unwrap();
        assert_eq!(
            Inbound::parse(&payload),
            Inbound::Control(ControlMessage::JoinRequest { reply_port: 50020 })
        );
    }

    #[test]
    fn test_invalid_utf8_chat_is_lossy() {
        let inbound = Inbound::parse(&[0x5b, 0xff, 0x5d]);
        match inbound {
            Inbound::Chat(text) => assert!(text.contains('\u{fffd}')),
            other => panic!("Expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn test_format_chat() {
        assert_eq!(format_chat(NodeId::new(4), "oi"), "[ID 4] oi");
    }
}
