//! Node runtime: wires the transports, roster actor and background tasks.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use mesh_core::{MembershipView, NodeState, PeerAddr, TransportError};

use crate::config::{ConfigError, NodeConfig};
use crate::coordinator::Coordinator;
use crate::discovery::GroupListener;
use crate::fanout::{fan_out_chat, DeliveryReport};
use crate::heartbeat::spawn_heartbeat_task;
use crate::join;
use crate::registry::{spawn_roster, NodeEvent, Role, RosterError, RosterHandle};
use crate::server::{ConnectionLimits, PeerServer};
use crate::transport::{GroupTransport, MulticastGroup, PeerSender, TcpPeerSender};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("cannot send chat while {state}")]
    NotRegistered { state: NodeState },
}

/// A running node.
///
/// Dropping the handle does not stop the background tasks; call
/// [`Node::shutdown`] or cancel the token passed to [`Node::start`].
pub struct Node {
    roster: RosterHandle,
    sender: Arc<dyn PeerSender>,
    local_addr: PeerAddr,
    is_coordinator: bool,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
}

impl Node {
    /// Starts a node over OS multicast and TCP.
    pub async fn launch(config: NodeConfig, cancel_token: CancellationToken) -> Result<Self, NodeError> {
        let group = Arc::new(MulticastGroup::bind(&config.group)?);
        let sender = Arc::new(TcpPeerSender::from_config(&config));
        Self::start(config, group, sender, cancel_token).await
    }

    /// Starts a node over the given transports.
    ///
    /// Validates `config` and binds the listener first; either failing
    /// aborts startup. Then spawns
    /// the accept loop and the group listener, and either the heartbeat
    /// (coordinator) or the join announcement (member).
    pub async fn start(
        config: NodeConfig,
        group: Arc<dyn GroupTransport>,
        sender: Arc<dyn PeerSender>,
        cancel_token: CancellationToken,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        let is_coordinator = config.is_coordinator();
        let tracker = TaskTracker::new();
        let limits = ConnectionLimits {
            read_timeout: config.io_timeout(),
            max_payload_bytes: config.timing.max_payload_bytes,
        };

        let server = PeerServer::bind(
            &config.host,
            config.port,
            limits,
            cancel_token.clone(),
            tracker.clone(),
        )
        .await?;

        // Announce the port actually bound, which differs from the
        // configured one only when that was 0.
        let local_port = server.local_port();
        let local_addr = PeerAddr::new(config.host.clone(), local_port);
        let role = if is_coordinator {
            Role::Coordinator {
                addr: local_addr.clone(),
            }
        } else {
            Role::Member
        };
        let roster = spawn_roster(role);

        info!(
            addr = %local_addr,
            coordinator = is_coordinator,
            "Node starting"
        );

        tracker.spawn(server.run(roster.clone()));

        let coordinator = is_coordinator
            .then(|| Coordinator::new(roster.clone(), Arc::clone(&sender), config.host.clone()));
        let listener = GroupListener::new(Arc::clone(&group), coordinator, cancel_token.clone());
        tracker.spawn(listener.run());

        if is_coordinator {
            spawn_heartbeat_task(
                &tracker,
                Arc::clone(&group),
                config.heartbeat_interval(),
                cancel_token.clone(),
            );
        } else if let Err(e) = join::announce(&roster, group.as_ref(), local_port).await {
            // Not fatal: the node stays unregistered, as when nobody answers
            warn!(error = %e, "Join announcement failed");
        }

        Ok(Self {
            roster,
            sender,
            local_addr,
            is_coordinator,
            cancel_token,
            tracker,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port
    }

    pub fn local_addr(&self) -> &PeerAddr {
        &self.local_addr
    }

    pub fn is_coordinator(&self) -> bool {
        self.is_coordinator
    }

    /// Snapshot of state, ID and cached roster.
    pub async fn membership(&self) -> Result<MembershipView, NodeError> {
        Ok(self.roster.membership().await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.roster.subscribe()
    }

    /// Sends `text` to every other member of the cached roster.
    ///
    /// # Errors
    ///
    /// `NodeError::NotRegistered` until the node holds an ID. Unreachable
    /// members are reported in the returned [`DeliveryReport`], not as errors.
    pub async fn send_chat(&self, text: &str) -> Result<DeliveryReport, NodeError> {
        let view = self.roster.membership().await?;
        let Some(id) = view.id.filter(|_| view.state.is_registered()) else {
            return Err(NodeError::NotRegistered { state: view.state });
        };

        Ok(fan_out_chat(Arc::clone(&self.sender), id, &view.roster, text).await)
    }

    /// Cancels every task and waits for them to finish.
    pub async fn shutdown(self) {
        info!(addr = %self.local_addr, "Node shutting down");
        self.cancel_token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
