//! Periodic removal of idle editing sessions.
//!
//! Sessions whose last activity is older than the stale threshold are
//! deleted without any `user-left` fan-out: their connections are already
//! gone from the dispatcher's point of view. A connection that is in fact
//! still alive gets its session back on its next content or cursor frame.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::collab::presence::PresenceRegistry;
use crate::collab::CollabResult;

/// Run one sweep. Returns the number of sessions removed.
pub async fn sweep_once(
    presence: &PresenceRegistry,
    stale_after: chrono::Duration,
) -> CollabResult<usize> {
    let removed = presence.sweep_stale(stale_after).await?;
    for session in &removed {
        tracing::debug!(
            page_id = session.page_id,
            user_id = session.user_id,
            socket_id = %session.socket_id,
            "Swept stale session"
        );
    }
    Ok(removed.len())
}

/// Run the janitor loop until `cancel` is triggered.
pub async fn run(
    presence: PresenceRegistry,
    interval: Duration,
    stale_after: chrono::Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        stale_secs = stale_after.num_seconds(),
        "Session janitor started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session janitor stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_once(&presence, stale_after).await {
                    Ok(0) => tracing::debug!("Session janitor: nothing to sweep"),
                    Ok(removed) => tracing::info!(removed, "Session janitor: swept stale sessions"),
                    Err(e) => tracing::error!(error = %e, "Session janitor: sweep failed"),
                }
            }
        }
    }
}
