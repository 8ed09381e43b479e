//! Repository for the `page_history` table.
//!
//! Entries are only ever inserted inside the publish transaction (see
//! [`PageRepo::publish`](crate::repositories::PageRepo::publish)); this
//! repository covers the read side.

use sqlx::PgPool;
use tandem_core::types::DbId;

use crate::models::page_history::PageHistoryEntry;

/// Column list for page_history queries.
const COLUMNS: &str = "id, page_id, title, content, previous_content, diff, \
    user_id, action_type, created_at";

pub struct PageHistoryRepo;

impl PageHistoryRepo {
    /// List all entries for a page, newest first.
    pub async fn list_by_page(
        pool: &PgPool,
        page_id: DbId,
    ) -> Result<Vec<PageHistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM page_history
             WHERE page_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, PageHistoryEntry>(&query)
            .bind(page_id)
            .fetch_all(pool)
            .await
    }
}
