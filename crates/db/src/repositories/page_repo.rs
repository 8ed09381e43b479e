//! Repository for the `pages` table.
//!
//! Page CRUD lives outside the collaboration core; this repository covers
//! the live-page reads the core performs and the transactional publish.

use sqlx::PgPool;
use tandem_core::types::DbId;

use crate::error::StoreError;
use crate::models::page::{CreatePage, Page};
use crate::models::page_history::PublishPage;

/// Column list for pages queries.
const COLUMNS: &str = "id, slug, title, content, parent_id, display_order, \
    created_by, created_at, updated_at, deleted_at";

pub struct PageRepo;

impl PageRepo {
    /// Insert a new page, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreatePage) -> Result<Page, sqlx::Error> {
        let query = format!(
            "INSERT INTO pages (slug, title, content, parent_id, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(&input.slug)
            .bind(&input.title)
            .bind(&input.content)
            .bind(input.parent_id)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a page that has not been soft-deleted.
    pub async fn find_live_by_id(pool: &PgPool, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a live page by its URL slug.
    pub async fn find_live_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE slug = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Page>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if `ancestor_id` is `page_id` itself or one of its
    /// ancestors. `UNION` stops the walk on a cyclic parent chain.
    pub async fn is_ancestor_or_self(
        pool: &PgPool,
        ancestor_id: DbId,
        page_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let (found,): (bool,) = sqlx::query_as(
            "WITH RECURSIVE chain AS (
                 SELECT id, parent_id FROM pages WHERE id = $2
                 UNION
                 SELECT p.id, p.parent_id FROM pages p JOIN chain c ON p.id = c.parent_id
             )
             SELECT EXISTS (SELECT 1 FROM chain WHERE id = $1)",
        )
        .bind(ancestor_id)
        .bind(page_id)
        .fetch_one(pool)
        .await?;
        Ok(found)
    }

    /// Promote a draft: update the page, append history, and drop the draft
    /// in a single transaction.
    pub async fn publish(pool: &PgPool, input: &PublishPage) -> Result<Page, StoreError> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE pages SET
                title = $2,
                content = $3,
                parent_id = CASE WHEN $4 THEN $5 ELSE parent_id END,
                updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        let page = sqlx::query_as::<_, Page>(&query)
            .bind(input.page_id)
            .bind(&input.title)
            .bind(&input.content)
            .bind(input.parent_id.is_some())
            .bind(input.parent_id.flatten())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "page",
                id: input.page_id,
            })?;

        if let Some(entry) = &input.history {
            sqlx::query(
                "INSERT INTO page_history
                    (page_id, title, content, previous_content, diff, user_id, action_type)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(input.page_id)
            .bind(&entry.title)
            .bind(&entry.content)
            .bind(&entry.previous_content)
            .bind(&entry.diff)
            .bind(entry.user_id)
            .bind(entry.action_type)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM page_drafts WHERE page_id = $1")
            .bind(input.page_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(page)
    }
}
