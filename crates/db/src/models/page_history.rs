//! Page history entry model.

use serde::Serialize;
use sqlx::FromRow;
use tandem_core::types::{DbId, Timestamp};

pub const ACTION_EDIT: &str = "edit";

/// A row from the `page_history` table. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PageHistoryEntry {
    pub id: DbId,
    pub page_id: DbId,
    pub title: String,
    pub content: String,
    pub previous_content: Option<String>,
    pub diff: Option<String>,
    pub user_id: Option<DbId>,
    pub action_type: String,
    pub created_at: Timestamp,
}

/// DTO for appending a history entry.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub title: String,
    pub content: String,
    pub previous_content: String,
    pub diff: String,
    pub user_id: DbId,
    pub action_type: &'static str,
}

/// Everything a publish writes, applied in one transaction.
#[derive(Debug, Clone)]
pub struct PublishPage {
    pub page_id: DbId,
    pub title: String,
    pub content: String,
    /// `None` keeps the current parent; `Some(None)` moves to the root.
    pub parent_id: Option<Option<DbId>>,
    pub history: Option<NewHistoryEntry>,
}
