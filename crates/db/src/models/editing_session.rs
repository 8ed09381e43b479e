//! Editing session (presence + cursor) models.

use serde::Serialize;
use sqlx::FromRow;
use tandem_core::collaboration::SessionMode;
use tandem_core::protocol::{CursorState, PresenceEntry, SessionSnapshot};
use tandem_core::types::{DbId, Timestamp};

/// Column list for `editing_sessions` queries.
pub(crate) const SESSION_COLUMNS: &str = "id, page_id, user_id, socket_id, mode, \
    cursor_position, selection_start, selection_end, last_activity, created_at";

fn parse_mode(mode: &str) -> SessionMode {
    // The check constraint only admits the two known values.
    mode.parse().unwrap_or(SessionMode::Viewing)
}

/// A row from the `editing_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EditingSession {
    pub id: DbId,
    pub page_id: DbId,
    pub user_id: DbId,
    pub socket_id: String,
    pub mode: String,
    pub cursor_position: i64,
    pub selection_start: i64,
    pub selection_end: i64,
    pub last_activity: Timestamp,
    pub created_at: Timestamp,
}

impl EditingSession {
    pub fn session_mode(&self) -> SessionMode {
        parse_mode(&self.mode)
    }
}

/// A session joined with the owning user's username and cursor color.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionWithUser {
    pub page_id: DbId,
    pub user_id: DbId,
    pub socket_id: String,
    pub mode: String,
    pub cursor_position: i64,
    pub selection_start: i64,
    pub selection_end: i64,
    pub last_activity: Timestamp,
    pub username: String,
    pub cursor_color: Option<String>,
}

impl SessionWithUser {
    pub fn session_mode(&self) -> SessionMode {
        parse_mode(&self.mode)
    }

    pub fn presence_entry(&self) -> PresenceEntry {
        PresenceEntry {
            user_id: self.user_id,
            username: self.username.clone(),
            color: self.cursor_color.clone(),
            mode: self.session_mode(),
            last_activity: self.last_activity,
        }
    }

    pub fn cursor_state(&self) -> CursorState {
        CursorState {
            position: self.cursor_position,
            selection_start: self.selection_start,
            selection_end: self.selection_end,
            username: self.username.clone(),
            color: self.cursor_color.clone(),
        }
    }
}

/// A session joined with user and page, for the admin dashboard.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveSession {
    pub page_id: DbId,
    pub page_slug: String,
    pub page_title: String,
    pub user_id: DbId,
    pub username: String,
    pub mode: String,
    pub last_activity: Timestamp,
}

impl ActiveSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            page_id: self.page_id,
            page_slug: self.page_slug.clone(),
            page_title: self.page_title.clone(),
            user_id: self.user_id,
            username: self.username.clone(),
            mode: parse_mode(&self.mode),
            last_activity: self.last_activity,
        }
    }
}
