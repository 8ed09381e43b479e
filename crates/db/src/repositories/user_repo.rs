//! Repository for the `users` table.

use sqlx::PgPool;
use tandem_core::types::DbId;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, password_hash, role, cursor_color, created_at, updated_at";

/// Provides the user reads and color writes the core needs.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, password_hash, role)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.password_hash)
            .bind(&input.role)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite a user's cursor color. Returns `false` if the user is absent.
    pub async fn set_color(pool: &PgPool, id: DbId, color: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET cursor_color = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(color)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Assign `candidate` only if the user has no color yet.
    ///
    /// Returns the color the user ends up with, or `None` if the user is
    /// absent. Concurrent callers all observe the same winner.
    pub async fn ensure_color(
        pool: &PgPool,
        id: DbId,
        candidate: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "UPDATE users SET cursor_color = COALESCE(cursor_color, $2)
             WHERE id = $1
             RETURNING cursor_color",
        )
        .bind(id)
        .bind(candidate)
        .fetch_optional(pool)
        .await?;
        Ok(row.and_then(|(color,)| color))
    }
}
