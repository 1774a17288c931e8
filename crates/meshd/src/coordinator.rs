//! Admission of joining nodes (coordinator only).
//!
//! For each join request the coordinator:
//! 1. asks the roster actor to admit `(own host, reply port)`, which assigns
//!    max ID + 1 atomically
//! 2. delivers the `JoinResponse` to the new node
//! 3. delivers a `RosterUpdate` to every other member
//!
//! A failed step 2 abandons the join without rolling back the roster entry.
//! Step 3 failures are reported and never retried.

use std::sync::Arc;

use tracing::{info, warn};

use mesh_core::{DeliveryError, NodeId, PeerAddr};
use mesh_protocol::ControlMessage;

use crate::fanout::{deliver_each, DeliveryReport};
use crate::registry::{RosterError, RosterHandle};
use crate::transport::PeerSender;

/// What happened to one join request.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// The new node received its ID; `notified` covers the roster update.
    Admitted { id: NodeId, notified: DeliveryReport },
    /// An ID was assigned but the response never reached the new node.
    ResponseUndelivered { id: NodeId, error: DeliveryError },
}

impl JoinOutcome {
    pub fn id(&self) -> NodeId {
        match self {
            JoinOutcome::Admitted { id, .. } | JoinOutcome::ResponseUndelivered { id, .. } => *id,
        }
    }
}

/// Coordinator-side join handling.
#[derive(Clone)]
pub struct Coordinator {
    roster: RosterHandle,
    sender: Arc<dyn PeerSender>,
    /// Host recorded for every admitted member
    host: String,
}

impl Coordinator {
    pub fn new(roster: RosterHandle, sender: Arc<dyn PeerSender>, host: impl Into<String>) -> Self {
        Self {
            roster,
            sender,
            host: host.into(),
        }
    }

    /// Admits the node listening on `reply_port`.
    ///
    /// The joining node's address is the coordinator's own host paired with
    /// the advertised port; the datagram's source address is not used.
    ///
    /// # Errors
    ///
    /// Only roster errors; delivery failures are part of [`JoinOutcome`].
    pub async fn handle_join_request(&self, reply_port: u16) -> Result<JoinOutcome, RosterError> {
        let addr = PeerAddr::new(self.host.clone(), reply_port);
        let admission = self.roster.admit(addr).await?;
        let id = admission.id;

        let response = match ControlMessage::join_response(id, admission.roster.clone()).encode()
        {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(JoinOutcome::ResponseUndelivered {
                    id,
                    error: DeliveryError::Send {
                        peer: admission.addr,
                        reason: e.to_string(),
                    },
                })
            }
        };

        if let Err(error) = self.sender.send(&admission.addr, &response).await {
            warn!(id = %id, peer = %admission.addr, error = %error, "Join response undelivered, abandoning join");
            return Ok(JoinOutcome::ResponseUndelivered { id, error });
        }

        info!(id = %id, peer = %admission.addr, members = admission.roster.len(), "Join response delivered");

        let targets = admission.roster.members_except(&[id, NodeId::COORDINATOR]);
        let notified = match ControlMessage::roster_update(admission.roster).encode() {
            Ok(bytes) => deliver_each(Arc::clone(&self.sender), targets, Arc::from(bytes)).await,
            Err(e) => {
                warn!(error = %e, "Failed to encode roster update");
                DeliveryReport::default()
            }
        };

        if !notified.all_delivered() {
            warn!(
                id = %id,
                unreachable = notified.unreachable.len(),
                "Roster update missed some members"
            );
        }

        Ok(JoinOutcome::Admitted { id, notified })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{spawn_roster, Role};
    use async_trait::async_trait;
    use mesh_core::Roster;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(PeerAddr, ControlMessage)>>,
        refuse: Vec<u16>,
    }

    impl RecordingSender {
        fn sent_to(&self, port: u16) -> Vec<ControlMessage> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(peer, _)| peer.port == port)
                .map(|(_, msg)| msg.clone())
                .collect()
        }
    }

    #[async_trait]
    impl PeerSender for RecordingSender {
        async fn send(&self, peer: &PeerAddr, payload: &[u8]) -> Result<(), DeliveryError> {
            if self.refuse.contains(&peer.port) {
                return Err(DeliveryError::Connect {
                    peer: peer.clone(),
                    reason: "connection refused".to_string(),
                });
            }
            let msg = ControlMessage::decode(payload).unwrap();
            self.sent.lock().unwrap().push((peer.clone(), msg));
            Ok(())
        }
    }

    fn coordinator(sender: Arc<RecordingSender>) -> (Coordinator, RosterHandle) {
        let roster = spawn_roster(Role::Coordinator {
            addr: PeerAddr::new("localhost", 50010),
        });
        (Coordinator::new(roster.clone(), sender, "localhost"), roster)
    }

    #[tokio::test]
    async fn test_first_join_gets_id_two_and_full_roster() {
        let sender = Arc::new(RecordingSender::default());
        let (coordinator, _roster) = coordinator(sender.clone());

        let outcome = coordinator.handle_join_request(50020).await.unwrap();
        assert_eq!(outcome.id(), NodeId::new(2));

        let mut expected = Roster::seeded(PeerAddr::new("localhost", 50010));
        expected.insert(NodeId::new(2), PeerAddr::new("localhost", 50020));

        assert_eq!(
            sender.sent_to(50020),
            vec![ControlMessage::join_response(NodeId::new(2), expected)]
        );
        // Nobody else to notify yet
        match outcome {
            JoinOutcome::Admitted { notified, .. } => assert_eq!(notified.attempted(), 0),
            other => panic!("Expected Admitted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_earlier_members_receive_roster_update() {
        let sender = Arc::new(RecordingSender::default());
        let (coordinator, _roster) = coordinator(sender.clone());

        coordinator.handle_join_request(50020).await.unwrap();
        coordinator.handle_join_request(50021).await.unwrap();
        let outcome = coordinator.handle_join_request(50022).await.unwrap();

        assert_eq!(outcome.id(), NodeId::new(4));

        // Node 2 saw one update per later join, node 3 one, node 4 none
        let updates_for_2 = sender.sent_to(50020);
        assert_eq!(updates_for_2.len(), 3);
        match updates_for_2.last() {
            Some(ControlMessage::RosterUpdate { peers }) => {
                assert_eq!(peers.len(), 4);
                assert_eq!(
                    peers.get(NodeId::new(4)),
                    Some(&PeerAddr::new("localhost", 50022))
                );
            }
            other => panic!("Expected RosterUpdate, got {other:?}"),
        }
        assert_eq!(sender.sent_to(50021).len(), 2);
        assert_eq!(sender.sent_to(50022).len(), 1);
        // The coordinator never messages itself
        assert!(sender.sent_to(50010).is_empty());
    }

    #[tokio::test]
    async fn test_undeliverable_response_keeps_roster_entry() {
        let sender = Arc::new(RecordingSender {
            refuse: vec![50020],
            ..Default::default()
        });
        let (coordinator, roster) = coordinator(sender);

        let outcome = coordinator.handle_join_request(50020).await.unwrap();
        assert!(matches!(
            outcome,
            JoinOutcome::ResponseUndelivered { id, .. } if id == NodeId::new(2)
        ));

        let view = roster.membership().await.unwrap();
        assert!(view.roster.contains(NodeId::new(2)));
    }

    #[tokio::test]
    async fn test_unreachable_member_is_reported() {
        let sender = Arc::new(RecordingSender {
            refuse: vec![50020],
            ..Default::default()
        });
        let (coordinator, _roster) = coordinator(sender);

        coordinator.handle_join_request(50020).await.unwrap();
        let outcome = coordinator.handle_join_request(50021).await.unwrap();

        match outcome {
            JoinOutcome::Admitted { id, notified } => {
                assert_eq!(id, NodeId::new(3));
                assert!(notified.delivered.is_empty());
                assert_eq!(notified.unreachable.len(), 1);
                assert_eq!(notified.unreachable[0].0, NodeId::new(2));
            }
            other => panic!("Expected Admitted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_member_cannot_coordinate() {
        let sender = Arc::new(RecordingSender::default());
        let roster = spawn_roster(Role::Member);
        let coordinator = Coordinator::new(roster, sender, "localhost");

        assert_eq!(
            coordinator.handle_join_request(50020).await.unwrap_err(),
            RosterError::NotCoordinator
        );
    }
}
