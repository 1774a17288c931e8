//! Delivery of one payload to many members.
//!
//! Used for chat and for the coordinator's roster updates. Each recipient
//! gets its own one-shot connection, all attempted concurrently. A failing
//! recipient is recorded and skipped; nobody is retried.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use mesh_core::{DeliveryError, NodeId, PeerAddr, Roster};
use mesh_protocol::format_chat;

use crate::transport::PeerSender;

/// Outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    /// Members that accepted the payload, ascending by ID
    pub delivered: Vec<NodeId>,
    /// Members that could not be reached, ascending by ID
    pub unreachable: Vec<(NodeId, DeliveryError)>,
}

impl DeliveryReport {
    /// Number of connection attempts made.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.unreachable.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.unreachable.is_empty()
    }
}

/// Sends `payload` to every target concurrently and waits for all attempts.
pub async fn deliver_each(
    sender: Arc<dyn PeerSender>,
    targets: Vec<(NodeId, PeerAddr)>,
    payload: Arc<[u8]>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    if targets.is_empty() {
        return report;
    }

    let mut tasks = JoinSet::new();
    for (id, addr) in targets {
        let sender = Arc::clone(&sender);
        let payload = Arc::clone(&payload);
        tasks.spawn(async move {
            let result = sender.send(&addr, &payload).await;
            (id, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, Ok(()))) => report.delivered.push(id),
            Ok((id, Err(e))) => {
                warn!(id = %id, error = %e, "Member unreachable, skipping");
                report.unreachable.push((id, e));
            }
            Err(e) => warn!(error = %e, "Delivery task failed"),
        }
    }

    report.delivered.sort();
    report.unreachable.sort_by_key(|(id, _)| *id);
    report
}

/// Sends `text`, prefixed with `author`'s ID, to every other roster entry.
///
/// A roster holding only the author makes no connection attempts.
pub async fn fan_out_chat(
    sender: Arc<dyn PeerSender>,
    author: NodeId,
    roster: &Roster,
    text: &str,
) -> DeliveryReport {
    let targets = roster.members_except(&[author]);
    let payload: Arc<[u8]> = Arc::from(format_chat(author, text).into_bytes());

    debug!(author = %author, recipients = targets.len(), "Fanning out chat");
    deliver_each(sender, targets, payload).await
}
