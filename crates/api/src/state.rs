use std::sync::Arc;

use tandem_db::Gateway;

use crate::collab::CollabServer;
use crate::config::ServerConfig;
use crate::ws::RoomHub;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence gateway (Postgres or in-memory).
    pub gateway: Arc<dyn Gateway>,
    pub config: Arc<ServerConfig>,
    /// Socket connections and their room memberships.
    pub hub: Arc<RoomHub>,
    /// The collaboration dispatcher.
    pub collab: Arc<CollabServer>,
}

impl AppState {
    /// Wire the hub and dispatcher around a gateway.
    pub fn new(gateway: Arc<dyn Gateway>, config: ServerConfig) -> Self {
        let hub = Arc::new(RoomHub::new());
        let collab = Arc::new(CollabServer::new(
            Arc::clone(&gateway),
            Arc::clone(&hub),
            config.jwt.clone(),
            config.collab.audit_feed_capacity,
        ));
        Self {
            gateway,
            config: Arc::new(config),
            hub,
            collab,
        }
    }
}
