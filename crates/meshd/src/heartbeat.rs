//! Coordinator liveness broadcast.
//!
//! Sends the raw heartbeat token on the group channel at a fixed interval for
//! as long as the node runs. Nothing consumes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use mesh_protocol::HEARTBEAT_TOKEN;

use crate::config::duration_ms;
use crate::transport::GroupTransport;

/// Spawns the heartbeat loop on `tracker`. The first beat goes out immediately.
///
/// Send failures are logged and the loop keeps going.
pub fn spawn_heartbeat_task(
    tracker: &TaskTracker,
    group: Arc<dyn GroupTransport>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    tracker.spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval_ms = duration_ms(period), "Heartbeat starting");

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("Heartbeat shutting down");
                    break;
                }

                _ = tick.tick() => {
                    match group.broadcast(HEARTBEAT_TOKEN.as_bytes()).await {
                        Ok(()) => trace!("Heartbeat sent"),
                        Err(e) => warn!(error = %e, "Heartbeat broadcast failed"),
                    }
                }
            }
        }
    });
}
