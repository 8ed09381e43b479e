//! The persistence seam between the dispatcher and storage.
//!
//! Everything the collaboration core reads or writes goes through
//! [`Gateway`]. Implementations must be safe to share across connection
//! tasks; each method is a single atomic step from the caller's view.

use async_trait::async_trait;
use sqlx::PgPool;
use tandem_core::collaboration::SessionMode;
use tandem_core::types::{DbId, Timestamp};

use crate::error::StoreResult;
use crate::models::draft::PageDraft;
use crate::models::editing_session::{ActiveSession, EditingSession, SessionWithUser};
use crate::models::page::{CreatePage, Page};
use crate::models::page_history::{PageHistoryEntry, PublishPage};
use crate::models::user::{CreateUser, User};
use crate::repositories::{
    DraftRepo, EditingSessionRepo, PageHistoryRepo, PageRepo, PageViewRepo, UserRepo,
};

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Confirm the backing store is reachable.
    async fn health_check(&self) -> StoreResult<()>;

    // -- users --

    async fn create_user(&self, input: &CreateUser) -> StoreResult<User>;
    async fn find_user(&self, id: DbId) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Overwrite the stored cursor color. Returns `false` if the user is absent.
    async fn set_user_color(&self, id: DbId, color: &str) -> StoreResult<bool>;
    /// Store `candidate` unless a color is already set; return the stored one.
    async fn ensure_user_color(&self, id: DbId, candidate: &str) -> StoreResult<Option<String>>;

    // -- pages --

    async fn create_page(&self, input: &CreatePage) -> StoreResult<Page>;
    async fn find_live_page(&self, id: DbId) -> StoreResult<Option<Page>>;
    async fn find_live_page_by_slug(&self, slug: &str) -> StoreResult<Option<Page>>;
    async fn is_ancestor_or_self(&self, ancestor_id: DbId, page_id: DbId) -> StoreResult<bool>;
    /// Update the page, append history and drop the draft atomically.
    async fn publish_page(&self, input: &PublishPage) -> StoreResult<Page>;
    async fn list_page_history(&self, page_id: DbId) -> StoreResult<Vec<PageHistoryEntry>>;
    async fn record_page_view(&self, page_id: DbId, user_id: Option<DbId>) -> StoreResult<()>;
    async fn count_page_views(&self, page_id: DbId) -> StoreResult<i64>;

    // -- drafts --

    async fn find_draft(&self, page_id: DbId) -> StoreResult<Option<PageDraft>>;
    /// Existing draft, or a fresh copy of the live page. `None` if no live page.
    async fn seed_draft_from_page(&self, page_id: DbId) -> StoreResult<Option<PageDraft>>;
    async fn upsert_draft(
        &self,
        page_id: DbId,
        content: &str,
        title: &str,
        user_id: DbId,
    ) -> StoreResult<PageDraft>;
    async fn delete_draft(&self, page_id: DbId) -> StoreResult<bool>;

    // -- editing sessions --

    async fn upsert_session(
        &self,
        page_id: DbId,
        user_id: DbId,
        socket_id: &str,
        mode: SessionMode,
    ) -> StoreResult<EditingSession>;
    async fn find_session_by_socket(&self, socket_id: &str)
        -> StoreResult<Option<EditingSession>>;
    async fn delete_session_by_socket(
        &self,
        socket_id: &str,
    ) -> StoreResult<Option<EditingSession>>;
    async fn delete_session_by_page_user(
        &self,
        page_id: DbId,
        user_id: DbId,
    ) -> StoreResult<Option<EditingSession>>;
    async fn list_page_sessions(&self, page_id: DbId) -> StoreResult<Vec<SessionWithUser>>;
    async fn touch_session(&self, socket_id: &str) -> StoreResult<bool>;
    async fn update_session_cursor(
        &self,
        socket_id: &str,
        position: i64,
        selection_start: i64,
        selection_end: i64,
    ) -> StoreResult<bool>;
    async fn set_session_mode(&self, socket_id: &str, mode: SessionMode) -> StoreResult<bool>;
    async fn delete_stale_sessions(&self, cutoff: Timestamp) -> StoreResult<Vec<EditingSession>>;
    async fn list_active_sessions(&self) -> StoreResult<Vec<ActiveSession>>;
}

/// [`Gateway`] backed by a shared Postgres database.
#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Gateway for PgGateway {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(crate::health_check(&self.pool).await?)
    }

    async fn create_user(&self, input: &CreateUser) -> StoreResult<User> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn find_user(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_username(&self.pool, username).await?)
    }

    async fn set_user_color(&self, id: DbId, color: &str) -> StoreResult<bool> {
        Ok(UserRepo::set_color(&self.pool, id, color).await?)
    }

    async fn ensure_user_color(&self, id: DbId, candidate: &str) -> StoreResult<Option<String>> {
        Ok(UserRepo::ensure_color(&self.pool, id, candidate).await?)
    }

    async fn create_page(&self, input: &CreatePage) -> StoreResult<Page> {
        Ok(PageRepo::create(&self.pool, input).await?)
    }

    async fn find_live_page(&self, id: DbId) -> StoreResult<Option<Page>> {
        Ok(PageRepo::find_live_by_id(&self.pool, id).await?)
    }

    async fn find_live_page_by_slug(&self, slug: &str) -> StoreResult<Option<Page>> {
        Ok(PageRepo::find_live_by_slug(&self.pool, slug).await?)
    }

    async fn is_ancestor_or_self(&self, ancestor_id: DbId, page_id: DbId) -> StoreResult<bool> {
        Ok(PageRepo::is_ancestor_or_self(&self.pool, ancestor_id, page_id).await?)
    }

    async fn publish_page(&self, input: &PublishPage) -> StoreResult<Page> {
        PageRepo::publish(&self.pool, input).await
    }

    async fn list_page_history(&self, page_id: DbId) -> StoreResult<Vec<PageHistoryEntry>> {
        Ok(PageHistoryRepo::list_by_page(&self.pool, page_id).await?)
    }

    async fn record_page_view(&self, page_id: DbId, user_id: Option<DbId>) -> StoreResult<()> {
        Ok(PageViewRepo::record(&self.pool, page_id, user_id).await?)
    }

    async fn count_page_views(&self, page_id: DbId) -> StoreResult<i64> {
        Ok(PageViewRepo::count(&self.pool, page_id).await?)
    }

    async fn find_draft(&self, page_id: DbId) -> StoreResult<Option<PageDraft>> {
        Ok(DraftRepo::find_by_page(&self.pool, page_id).await?)
    }

    async fn seed_draft_from_page(&self, page_id: DbId) -> StoreResult<Option<PageDraft>> {
        Ok(DraftRepo::seed_from_page(&self.pool, page_id).await?)
    }

    async fn upsert_draft(
        &self,
        page_id: DbId,
        content: &str,
        title: &str,
        user_id: DbId,
    ) -> StoreResult<PageDraft> {
        Ok(DraftRepo::upsert(&self.pool, page_id, content, title, user_id).await?)
    }

    async fn delete_draft(&self, page_id: DbId) -> StoreResult<bool> {
        Ok(DraftRepo::delete(&self.pool, page_id).await?)
    }

    async fn upsert_session(
        &self,
        page_id: DbId,
        user_id: DbId,
        socket_id: &str,
        mode: SessionMode,
    ) -> StoreResult<EditingSession> {
        Ok(EditingSessionRepo::upsert(&self.pool, page_id, user_id, socket_id, mode).await?)
    }

    async fn find_session_by_socket(
        &self,
        socket_id: &str,
    ) -> StoreResult<Option<EditingSession>> {
        Ok(EditingSessionRepo::find_by_socket(&self.pool, socket_id).await?)
    }

    async fn delete_session_by_socket(
        &self,
        socket_id: &str,
    ) -> StoreResult<Option<EditingSession>> {
        Ok(EditingSessionRepo::delete_by_socket(&self.pool, socket_id).await?)
    }

    async fn delete_session_by_page_user(
        &self,
        page_id: DbId,
        user_id: DbId,
    ) -> StoreResult<Option<EditingSession>> {
        Ok(EditingSessionRepo::delete_by_page_user(&self.pool, page_id, user_id).await?)
    }

    async fn list_page_sessions(&self, page_id: DbId) -> StoreResult<Vec<SessionWithUser>> {
        Ok(EditingSessionRepo::list_by_page(&self.pool, page_id).await?)
    }

    async fn touch_session(&self, socket_id: &str) -> StoreResult<bool> {
        Ok(EditingSessionRepo::touch(&self.pool, socket_id).await?)
    }

    async fn update_session_cursor(
        &self,
        socket_id: &str,
        position: i64,
        selection_start: i64,
        selection_end: i64,
    ) -> StoreResult<bool> {
        Ok(EditingSessionRepo::update_cursor(
            &self.pool,
            socket_id,
            position,
            selection_start,
            selection_end,
        )
        .await?)
    }

    async fn set_session_mode(&self, socket_id: &str, mode: SessionMode) -> StoreResult<bool> {
        Ok(EditingSessionRepo::set_mode(&self.pool, socket_id, mode).await?)
    }

    async fn delete_stale_sessions(&self, cutoff: Timestamp) -> StoreResult<Vec<EditingSession>> {
        Ok(EditingSessionRepo::delete_stale(&self.pool, cutoff).await?)
    }

    async fn list_active_sessions(&self) -> StoreResult<Vec<ActiveSession>> {
        Ok(EditingSessionRepo::list_active(&self.pool).await?)
    }
}
