//! Group channel consumer.
//!
//! Every node listens on the group. Only the coordinator acts on join
//! requests; everyone else drops them. Heartbeats are logged and otherwise
//! ignored. Anything else on the group is noise.
//!
//! Join requests are handled one at a time, in arrival order, so roster
//! updates leave the coordinator in admission order.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use mesh_core::TransportError;
use mesh_protocol::{ControlMessage, Inbound};

use crate::coordinator::{Coordinator, JoinOutcome};
use crate::transport::GroupTransport;

/// Pause after a transient receive error before trying again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Consumes the group channel until cancelled.
pub struct GroupListener {
    group: Arc<dyn GroupTransport>,
    /// `Some` only on the coordinator
    coordinator: Option<Coordinator>,
    cancel_token: CancellationToken,
}

impl GroupListener {
    pub fn new(
        group: Arc<dyn GroupTransport>,
        coordinator: Option<Coordinator>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            group,
            coordinator,
            cancel_token,
        }
    }

    pub async fn run(self) {
        loop {
            let received = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Group listener shutting down");
                    break;
                }
                received = self.group.recv() => received,
            };

            match received {
                Ok((payload, from)) => self.handle_datagram(&payload, from).await,
                Err(TransportError::GroupClosed(reason)) => {
                    error!(reason = %reason, "Group channel closed, listener stopping");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Group receive failed");
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn handle_datagram(&self, payload: &[u8], from: std::net::SocketAddr) {
        match Inbound::parse(payload) {
            Inbound::Control(ControlMessage::JoinRequest { reply_port }) => {
                let Some(coordinator) = &self.coordinator else {
                    trace!(from = %from, reply_port, "Discarding join request, not the coordinator");
                    return;
                };

                debug!(from = %from, reply_port, "Join request");
                match coordinator.handle_join_request(reply_port).await {
                    Ok(JoinOutcome::Admitted { id, notified }) => {
                        info!(
                            id = %id,
                            reply_port,
                            notified = notified.delivered.len(),
                            unreachable = notified.unreachable.len(),
                            "Join completed"
                        );
                    }
                    Ok(JoinOutcome::ResponseUndelivered { id, .. }) => {
                        debug!(id = %id, reply_port, "Join abandoned");
                    }
                    Err(e) => {
                        warn!(reply_port, error = %e, "Join request failed");
                    }
                }
            }
            Inbound::Control(ControlMessage::Heartbeat) => {
                trace!(from = %from, "Heartbeat");
            }
            Inbound::Control(other) => {
                debug!(from = %from, kind = other.kind(), "Unexpected message on group channel");
            }
            Inbound::Chat(_) => {
                trace!(from = %from, bytes = payload.len(), "Ignoring unrecognised group datagram");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{spawn_roster, Role};
    use crate::transport::{MemoryGroup, PeerSender};
    use async_trait::async_trait;
    use mesh_core::{DeliveryError, NodeId, PeerAddr};

    struct AcceptAll;

    #[async_trait]
    impl PeerSender for AcceptAll {
        async fn send(&self, _peer: &PeerAddr, _payload: &[u8]) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    async fn wait_for_members(roster: &crate::registry::RosterHandle, n: usize) -> usize {
        for _ in 0..50 {
            let len = roster.membership().await.unwrap().roster.len();
            if len >= n {
                return len;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        roster.membership().await.unwrap().roster.len()
    }

    #[tokio::test]
    async fn test_coordinator_admits_from_group() {
        let group = MemoryGroup::new();
        let roster = spawn_roster(Role::Coordinator {
            addr: PeerAddr::new("localhost", 50010),
        });
        let coordinator = Coordinator::new(roster.clone(), Arc::new(AcceptAll), "localhost");
        let cancel = CancellationToken::new();

        let listener = GroupListener::new(Arc::new(group.join()), Some(coordinator), cancel.clone());
        let task = tokio::spawn(listener.run());

        let joiner = group.join();
        joiner
            .broadcast(&ControlMessage::join_request(50020).encode().unwrap())
            .await
            .unwrap();
        joiner.broadcast(b"VIVO").await.unwrap();
        joiner.broadcast(b"random noise").await.unwrap();

        assert_eq!(wait_for_members(&roster, 2).await, 2);
        let view = roster.membership().await.unwrap();
        assert_eq!(
            view.roster.get(NodeId::new(2)),
            Some(&PeerAddr::new("localhost", 50020))
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_member_discards_join_requests() {
        let group = MemoryGroup::new();
        let roster = spawn_roster(Role::Member);
        let cancel = CancellationToken::new();

        let listener = GroupListener::new(Arc::new(group.join()), None, cancel.clone());
        let task = tokio::spawn(listener.run());

        group
            .join()
            .broadcast(&ControlMessage::join_request(50020).encode().unwrap())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(roster.membership().await.unwrap().roster.is_empty());

        cancel.cancel();
        task.await.unwrap();
    }
}
