//! Repository for the `editing_sessions` table.
//!
//! One row per (page, user) and one row per socket, enforced by
//! `uq_editing_sessions_page_user` and `uq_editing_sessions_socket`. Presence
//! and cursor state share the same row.

use sqlx::PgPool;
use tandem_core::collaboration::SessionMode;
use tandem_core::types::{DbId, Timestamp};

use crate::models::editing_session::{
    ActiveSession, EditingSession, SessionWithUser, SESSION_COLUMNS,
};

pub struct EditingSessionRepo;

impl EditingSessionRepo {
    /// Record a (page, user) session for `socket_id`.
    ///
    /// A re-join overwrites the socket id and mode and resets the cursor.
    /// Any row the socket still holds on another page is dropped first so
    /// the socket uniqueness constraint cannot trip.
    pub async fn upsert(
        pool: &PgPool,
        page_id: DbId,
        user_id: DbId,
        socket_id: &str,
        mode: SessionMode,
    ) -> Result<EditingSession, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "DELETE FROM editing_sessions
             WHERE socket_id = $3 AND NOT (page_id = $1 AND user_id = $2)",
        )
        .bind(page_id)
        .bind(user_id)
        .bind(socket_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO editing_sessions (page_id, user_id, socket_id, mode, last_activity)
             VALUES ($1, $2, $3, $4, NOW())
             ON CONFLICT (page_id, user_id) DO UPDATE SET
                socket_id = EXCLUDED.socket_id,
                mode = EXCLUDED.mode,
                cursor_position = 0,
                selection_start = 0,
                selection_end = 0,
                last_activity = NOW()
             RETURNING {SESSION_COLUMNS}"
        );
        let session = sqlx::query_as::<_, EditingSession>(&query)
            .bind(page_id)
            .bind(user_id)
            .bind(socket_id)
            .bind(mode.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(session)
    }

    pub async fn find_by_socket(
        pool: &PgPool,
        socket_id: &str,
    ) -> Result<Option<EditingSession>, sqlx::Error> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM editing_sessions WHERE socket_id = $1");
        sqlx::query_as::<_, EditingSession>(&query)
            .bind(socket_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_by_socket(
        pool: &PgPool,
        socket_id: &str,
    ) -> Result<Option<EditingSession>, sqlx::Error> {
        let query = format!(
            "DELETE FROM editing_sessions WHERE socket_id = $1 RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, EditingSession>(&query)
            .bind(socket_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_by_page_user(
        pool: &PgPool,
        page_id: DbId,
        user_id: DbId,
    ) -> Result<Option<EditingSession>, sqlx::Error> {
        let query = format!(
            "DELETE FROM editing_sessions WHERE page_id = $1 AND user_id = $2
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, EditingSession>(&query)
            .bind(page_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// All sessions on a page with username and color, most recent first.
    pub async fn list_by_page(
        pool: &PgPool,
        page_id: DbId,
    ) -> Result<Vec<SessionWithUser>, sqlx::Error> {
        sqlx::query_as::<_, SessionWithUser>(
            "SELECT s.page_id, s.user_id, s.socket_id, s.mode, s.cursor_position,
                    s.selection_start, s.selection_end, s.last_activity,
                    u.username, u.cursor_color
             FROM editing_sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.page_id = $1
             ORDER BY s.last_activity DESC",
        )
        .bind(page_id)
        .fetch_all(pool)
        .await
    }

    /// Bump `last_activity`. Returns `false` if the socket has no session.
    pub async fn touch(pool: &PgPool, socket_id: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE editing_sessions SET last_activity = NOW() WHERE socket_id = $1")
                .bind(socket_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store cursor and selection. Also counts as activity.
    pub async fn update_cursor(
        pool: &PgPool,
        socket_id: &str,
        position: i64,
        selection_start: i64,
        selection_end: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE editing_sessions SET
                cursor_position = $2,
                selection_start = $3,
                selection_end = $4,
                last_activity = NOW()
             WHERE socket_id = $1",
        )
        .bind(socket_id)
        .bind(position)
        .bind(selection_start)
        .bind(selection_end)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change the mode of the session identified by `socket_id`.
    pub async fn set_mode(
        pool: &PgPool,
        socket_id: &str,
        mode: SessionMode,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE editing_sessions SET mode = $2, last_activity = NOW() WHERE socket_id = $1",
        )
        .bind(socket_id)
        .bind(mode.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session idle since before `cutoff`, returning them.
    pub async fn delete_stale(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<EditingSession>, sqlx::Error> {
        let query = format!(
            "DELETE FROM editing_sessions WHERE last_activity < $1 RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, EditingSession>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Every session with its page and user, for the admin snapshot.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<ActiveSession>, sqlx::Error> {
        sqlx::query_as::<_, ActiveSession>(
            "SELECT s.page_id, p.slug AS page_slug, p.title AS page_title,
                    s.user_id, u.username, s.mode, s.last_activity
             FROM editing_sessions s
             JOIN users u ON u.id = s.user_id
             JOIN pages p ON p.id = s.page_id
             ORDER BY s.last_activity DESC",
        )
        .fetch_all(pool)
        .await
    }
}
