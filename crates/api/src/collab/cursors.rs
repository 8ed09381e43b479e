//! Cursor Registry: per-connection cursor state and per-user colors.
//!
//! Cursor fields live on the same session row as presence.

use std::collections::BTreeMap;
use std::sync::Arc;

use tandem_core::colors;
use tandem_core::protocol::CursorState;
use tandem_core::types::DbId;
use tandem_db::{Gateway, StoreError};

use super::error::CollabResult;

#[derive(Clone)]
pub struct CursorRegistry {
    gateway: Arc<dyn Gateway>,
}

impl CursorRegistry {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Store cursor and selection for a connection's session. Callers clamp
    /// the values to be non-negative. Returns `false` if no session exists.
    pub async fn update(
        &self,
        conn_id: &str,
        position: i64,
        selection_start: i64,
        selection_end: i64,
    ) -> CollabResult<bool> {
        Ok(self
            .gateway
            .update_session_cursor(conn_id, position, selection_start, selection_end)
            .await?)
    }

    /// Cursors of the editing sessions on a page, keyed by user id.
    pub async fn list_page(&self, page_id: DbId) -> CollabResult<BTreeMap<DbId, CursorState>> {
        let sessions = self.gateway.list_page_sessions(page_id).await?;
        Ok(sessions
            .iter()
            .filter(|s| s.session_mode().is_editing())
            .map(|s| (s.user_id, s.cursor_state()))
            .collect())
    }

    pub fn generate_color(&self) -> String {
        colors::generate_color()
    }

    /// The user's color, allocating and persisting one on first need.
    pub async fn ensure_color(&self, user_id: DbId) -> CollabResult<String> {
        let candidate = self.generate_color();
        self.gateway
            .ensure_user_color(user_id, &candidate)
            .await?
            .ok_or_else(|| {
                StoreError::NotFound {
                    entity: "user",
                    id: user_id,
                }
                .into()
            })
    }

    /// Validate `#rrggbb` and persist it as the user's color.
    pub async fn set_color(&self, user_id: DbId, color: &str) -> CollabResult<()> {
        colors::validate_color(color)?;
        if !self.gateway.set_user_color(user_id, color).await? {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id,
            }
            .into());
        }
        Ok(())
    }
}
