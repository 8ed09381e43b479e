//! Shared page draft model.

use serde::Serialize;
use sqlx::FromRow;
use tandem_core::protocol::DraftSnapshot;
use tandem_core::types::{DbId, Timestamp};

/// A row from the `page_drafts` table. At most one exists per page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PageDraft {
    pub id: DbId,
    pub page_id: DbId,
    pub content: String,
    pub title: String,
    pub last_modified_by: Option<DbId>,
    pub last_modified_at: Timestamp,
}

impl PageDraft {
    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            content: self.content.clone(),
            title: self.title.clone(),
            last_modified_by: self.last_modified_by,
            last_modified_at: self.last_modified_at,
        }
    }
}
