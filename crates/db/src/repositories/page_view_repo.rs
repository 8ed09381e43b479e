//! Repository for the `page_views` table.

use sqlx::PgPool;
use tandem_core::types::DbId;

/// Append-only view log written by the read path.
pub struct PageViewRepo;

impl PageViewRepo {
    pub async fn record(
        pool: &PgPool,
        page_id: DbId,
        user_id: Option<DbId>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO page_views (page_id, user_id) VALUES ($1, $2)")
            .bind(page_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Total number of recorded views for a page.
    pub async fn count(pool: &PgPool, page_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM page_views WHERE page_id = $1")
            .bind(page_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
