//! Page entity model.

use serde::Serialize;
use sqlx::FromRow;
use tandem_core::types::{DbId, Timestamp};

/// A row from the `pages` table.
///
/// Rows with `deleted_at` set are soft-deleted and never returned by the
/// gateway's page lookups.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Page {
    pub id: DbId,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub parent_id: Option<DbId>,
    pub display_order: i32,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// DTO for seeding a page (page CRUD itself lives outside the core).
#[derive(Debug, Clone)]
pub struct CreatePage {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub parent_id: Option<DbId>,
    pub created_by: Option<DbId>,
}
