//! Repository for the `page_drafts` table.
//!
//! The `uq_page_drafts_page` constraint keeps at most one draft per page;
//! every write is a single-statement upsert against it.

use sqlx::PgPool;
use tandem_core::types::DbId;

use crate::models::draft::PageDraft;

const COLUMNS: &str = "id, page_id, content, title, last_modified_by, last_modified_at";

pub struct DraftRepo;

impl DraftRepo {
    pub async fn find_by_page(
        pool: &PgPool,
        page_id: DbId,
    ) -> Result<Option<PageDraft>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM page_drafts WHERE page_id = $1");
        sqlx::query_as::<_, PageDraft>(&query)
            .bind(page_id)
            .fetch_optional(pool)
            .await
    }

    /// Return the existing draft, or seed one from the live page.
    ///
    /// Returns `None` when the page is absent or soft-deleted. The no-op
    /// `DO UPDATE` makes `RETURNING` yield the existing row on conflict.
    pub async fn seed_from_page(
        pool: &PgPool,
        page_id: DbId,
    ) -> Result<Option<PageDraft>, sqlx::Error> {
        let query = format!(
            "INSERT INTO page_drafts (page_id, content, title)
             SELECT id, content, title FROM pages WHERE id = $1 AND deleted_at IS NULL
             ON CONFLICT (page_id) DO UPDATE SET page_id = EXCLUDED.page_id
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PageDraft>(&query)
            .bind(page_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace the draft body and title.
    pub async fn upsert(
        pool: &PgPool,
        page_id: DbId,
        content: &str,
        title: &str,
        user_id: DbId,
    ) -> Result<PageDraft, sqlx::Error> {
        let query = format!(
            "INSERT INTO page_drafts (page_id, content, title, last_modified_by, last_modified_at)
             VALUES ($1, $2, $3, $4, NOW())
             ON CONFLICT (page_id) DO UPDATE SET
                content = EXCLUDED.content,
                title = EXCLUDED.title,
                last_modified_by = EXCLUDED.last_modified_by,
                last_modified_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PageDraft>(&query)
            .bind(page_id)
            .bind(content)
            .bind(title)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Remove the draft. Returns `true` if one existed.
    pub async fn delete(pool: &PgPool, page_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM page_drafts WHERE page_id = $1")
            .bind(page_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
