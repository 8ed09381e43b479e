//! Presence Registry: which connection is on which page, in which mode.

use std::sync::Arc;

use chrono::Utc;
use tandem_core::collaboration::SessionMode;
use tandem_core::protocol::SessionSnapshot;
use tandem_core::types::DbId;
use tandem_db::models::editing_session::{EditingSession, SessionWithUser};
use tandem_db::Gateway;

use super::error::CollabResult;

#[derive(Clone)]
pub struct PresenceRegistry {
    gateway: Arc<dyn Gateway>,
}

impl PresenceRegistry {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Record the (page, user) session for `conn_id`, replacing any earlier
    /// connection of that user on that page.
    pub async fn join(
        &self,
        page_id: DbId,
        user_id: DbId,
        conn_id: &str,
        mode: SessionMode,
    ) -> CollabResult<EditingSession> {
        Ok(self
            .gateway
            .upsert_session(page_id, user_id, conn_id, mode)
            .await?)
    }

    pub async fn leave_by_conn(&self, conn_id: &str) -> CollabResult<Option<EditingSession>> {
        Ok(self.gateway.delete_session_by_socket(conn_id).await?)
    }

    pub async fn leave_by_page(
        &self,
        page_id: DbId,
        user_id: DbId,
    ) -> CollabResult<Option<EditingSession>> {
        Ok(self
            .gateway
            .delete_session_by_page_user(page_id, user_id)
            .await?)
    }

    /// Sessions on a page with username and color, most recent first.
    pub async fn list_page(&self, page_id: DbId) -> CollabResult<Vec<SessionWithUser>> {
        Ok(self.gateway.list_page_sessions(page_id).await?)
    }

    /// Returns `false` if the connection has no session (e.g. it was swept).
    pub async fn bump_activity(&self, conn_id: &str) -> CollabResult<bool> {
        Ok(self.gateway.touch_session(conn_id).await?)
    }

    pub async fn get_by_conn(&self, conn_id: &str) -> CollabResult<Option<EditingSession>> {
        Ok(self.gateway.find_session_by_socket(conn_id).await?)
    }

    /// Set the mode of the session identified by `conn_id`.
    pub async fn set_mode(&self, conn_id: &str, mode: SessionMode) -> CollabResult<bool> {
        Ok(self.gateway.set_session_mode(conn_id, mode).await?)
    }

    /// Delete every session idle for longer than `threshold`, returning them.
    pub async fn sweep_stale(
        &self,
        threshold: chrono::Duration,
    ) -> CollabResult<Vec<EditingSession>> {
        let Some(cutoff) = Utc::now().checked_sub_signed(threshold) else {
            return Ok(Vec::new());
        };
        Ok(self.gateway.delete_stale_sessions(cutoff).await?)
    }

    /// Every live session, for the admin dashboard.
    pub async fn list_active(&self) -> CollabResult<Vec<SessionSnapshot>> {
        let rows = self.gateway.list_active_sessions().await?;
        Ok(rows.iter().map(|row| row.snapshot()).collect())
    }
}
