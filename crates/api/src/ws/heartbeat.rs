use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::RoomHub;

/// Spawn a task that pings every connected socket at `interval`.
///
/// Peers that stopped answering are detected by the transport and their
/// receive loop ends, which runs the normal disconnect cleanup.
pub fn start_heartbeat(hub: Arc<RoomHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let count = hub.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            hub.ping_all().await;
        }
    })
}
