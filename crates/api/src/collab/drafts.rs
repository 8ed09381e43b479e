//! Draft Store: the shared working copy of each page.
//!
//! At most one draft exists per page. It is seeded from the published page
//! on first join, overwritten on every content change (last writer wins) and
//! dropped on publish or revert.

use std::sync::Arc;

use tandem_core::types::DbId;
use tandem_db::models::draft::PageDraft;
use tandem_db::Gateway;

use super::error::{CollabError, CollabResult};

#[derive(Clone)]
pub struct DraftStore {
    gateway: Arc<dyn Gateway>,
}

impl DraftStore {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Existing draft, or a new one copied from the live page with no
    /// last modifier.
    pub async fn get_or_create(&self, page_id: DbId) -> CollabResult<PageDraft> {
        self.gateway
            .seed_draft_from_page(page_id)
            .await?
            .ok_or(CollabError::PageNotFound(page_id))
    }

    pub async fn get(&self, page_id: DbId) -> CollabResult<Option<PageDraft>> {
        Ok(self.gateway.find_draft(page_id).await?)
    }

    pub async fn update(
        &self,
        page_id: DbId,
        content: &str,
        title: &str,
        user_id: DbId,
    ) -> CollabResult<PageDraft> {
        Ok(self
            .gateway
            .upsert_draft(page_id, content, title, user_id)
            .await?)
    }

    /// Remove the draft if there is one. Returns whether one existed.
    pub async fn delete(&self, page_id: DbId) -> CollabResult<bool> {
        Ok(self.gateway.delete_draft(page_id).await?)
    }

    /// `true` iff a draft exists and its body or title differs from the
    /// live page, byte for byte.
    pub async fn has_changes(&self, page_id: DbId) -> CollabResult<bool> {
        let Some(draft) = self.get(page_id).await? else {
            return Ok(false);
        };
        let page = self
            .gateway
            .find_live_page(page_id)
            .await?
            .ok_or(CollabError::PageNotFound(page_id))?;
        Ok(draft.content != page.content || draft.title != page.title)
    }
}
