//! In-process [`Gateway`] for single-node deployments and tests.
//!
//! All tables live behind one `RwLock`, so every gateway call is atomic
//! with respect to every other. Constraint behavior mirrors the Postgres
//! schema: one draft per page, one session per (page, user), one session
//! per socket.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use tandem_core::collaboration::SessionMode;
use tandem_core::types::{DbId, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::gateway::Gateway;
use crate::models::draft::PageDraft;
use crate::models::editing_session::{ActiveSession, EditingSession, SessionWithUser};
use crate::models::page::{CreatePage, Page};
use crate::models::page_history::{PageHistoryEntry, PublishPage};
use crate::models::user::{CreateUser, User};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    users: BTreeMap<DbId, User>,
    pages: BTreeMap<DbId, Page>,
    /// Keyed by page id.
    drafts: HashMap<DbId, PageDraft>,
    sessions: BTreeMap<DbId, EditingSession>,
    history: Vec<PageHistoryEntry>,
    views: Vec<(DbId, Option<DbId>, Timestamp)>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn live_page(&self, id: DbId) -> Option<&Page> {
        self.pages.get(&id).filter(|p| p.deleted_at.is_none())
    }

    fn live_page_by_slug(&self, slug: &str) -> Option<&Page> {
        self.pages
            .values()
            .find(|p| p.deleted_at.is_none() && p.slug == slug)
    }

    fn session_id_by_socket(&self, socket_id: &str) -> Option<DbId> {
        self.sessions
            .values()
            .find(|s| s.socket_id == socket_id)
            .map(|s| s.id)
    }

    fn session_by_socket_mut(&mut self, socket_id: &str) -> Option<&mut EditingSession> {
        self.sessions
            .values_mut()
            .find(|s| s.socket_id == socket_id)
    }
}

#[derive(Default)]
pub struct MemoryGateway {
    tables: RwLock<Tables>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a page deleted without touching its drafts or sessions.
    pub async fn soft_delete_page(&self, id: DbId) -> bool {
        let mut t = self.tables.write().await;
        match t.pages.get_mut(&id) {
            Some(page) => {
                page.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Rewrite a session's `last_activity`, e.g. to age it past the
    /// janitor's threshold.
    pub async fn set_session_activity(&self, socket_id: &str, at: Timestamp) -> bool {
        let mut t = self.tables.write().await;
        match t.session_by_socket_mut(socket_id) {
            Some(session) => {
                session.last_activity = at;
                true
            }
            None => false,
        }
    }

    /// Number of session rows, across all pages.
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, input: &CreateUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == input.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' is taken",
                input.username
            )));
        }
        let now = Utc::now();
        let user = User {
            id: t.next_id(),
            username: input.username.clone(),
            password_hash: input.password_hash.clone(),
            role: input.role.clone(),
            cursor_color: None,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn set_user_color(&self, id: DbId, color: &str) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(&id) {
            Some(user) => {
                user.cursor_color = Some(color.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ensure_user_color(&self, id: DbId, candidate: &str) -> StoreResult<Option<String>> {
        let mut t = self.tables.write().await;
        Ok(t.users.get_mut(&id).map(|user| {
            user.cursor_color
                .get_or_insert_with(|| candidate.to_string())
                .clone()
        }))
    }

    async fn create_page(&self, input: &CreatePage) -> StoreResult<Page> {
        let mut t = self.tables.write().await;
        if t.live_page_by_slug(&input.slug).is_some() {
            return Err(StoreError::Conflict(format!(
                "slug '{}' is taken",
                input.slug
            )));
        }
        let now = Utc::now();
        let page = Page {
            id: t.next_id(),
            slug: input.slug.clone(),
            title: input.title.clone(),
            content: input.content.clone(),
            parent_id: input.parent_id,
            display_order: 0,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        t.pages.insert(page.id, page.clone());
        Ok(page)
    }

    async fn find_live_page(&self, id: DbId) -> StoreResult<Option<Page>> {
        Ok(self.tables.read().await.live_page(id).cloned())
    }

    async fn find_live_page_by_slug(&self, slug: &str) -> StoreResult<Option<Page>> {
        Ok(self.tables.read().await.live_page_by_slug(slug).cloned())
    }

    async fn is_ancestor_or_self(&self, ancestor_id: DbId, page_id: DbId) -> StoreResult<bool> {
        let t = self.tables.read().await;
        let mut current = Some(page_id);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor_id {
                return Ok(true);
            }
            // A corrupt parent chain must not loop forever.
            steps += 1;
            if steps > t.pages.len() {
                break;
            }
            current = t.pages.get(&id).and_then(|p| p.parent_id);
        }
        Ok(false)
    }

    async fn publish_page(&self, input: &PublishPage) -> StoreResult<Page> {
        let mut t = self.tables.write().await;
        if t.live_page(input.page_id).is_none() {
            return Err(StoreError::NotFound {
                entity: "page",
                id: input.page_id,
            });
        }

        let now = Utc::now();
        let entry = input.history.as_ref().map(|h| PageHistoryEntry {
            id: t.next_id(),
            page_id: input.page_id,
            title: h.title.clone(),
            content: h.content.clone(),
            previous_content: Some(h.previous_content.clone()),
            diff: Some(h.diff.clone()),
            user_id: Some(h.user_id),
            action_type: h.action_type.to_string(),
            created_at: now,
        });

        let page = t
            .pages
            .get_mut(&input.page_id)
            .ok_or(StoreError::NotFound {
                entity: "page",
                id: input.page_id,
            })?;
        page.title = input.title.clone();
        page.content = input.content.clone();
        if let Some(parent_id) = input.parent_id {
            page.parent_id = parent_id;
        }
        page.updated_at = now;
        let page = page.clone();

        t.history.extend(entry);
        t.drafts.remove(&input.page_id);
        Ok(page)
    }

    async fn list_page_history(&self, page_id: DbId) -> StoreResult<Vec<PageHistoryEntry>> {
        let t = self.tables.read().await;
        let mut entries: Vec<_> = t
            .history
            .iter()
            .filter(|h| h.page_id == page_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn record_page_view(&self, page_id: DbId, user_id: Option<DbId>) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.views.push((page_id, user_id, Utc::now()));
        Ok(())
    }

    async fn count_page_views(&self, page_id: DbId) -> StoreResult<i64> {
        let t = self.tables.read().await;
        Ok(t.views.iter().filter(|(p, _, _)| *p == page_id).count() as i64)
    }

    async fn find_draft(&self, page_id: DbId) -> StoreResult<Option<PageDraft>> {
        Ok(self.tables.read().await.drafts.get(&page_id).cloned())
    }

    async fn seed_draft_from_page(&self, page_id: DbId) -> StoreResult<Option<PageDraft>> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t.drafts.get(&page_id) {
            return Ok(Some(existing.clone()));
        }
        let Some((content, title)) = t
            .live_page(page_id)
            .map(|p| (p.content.clone(), p.title.clone()))
        else {
            return Ok(None);
        };
        let draft = PageDraft {
            id: t.next_id(),
            page_id,
            content,
            title,
            last_modified_by: None,
            last_modified_at: Utc::now(),
        };
        t.drafts.insert(page_id, draft.clone());
        Ok(Some(draft))
    }

    async fn upsert_draft(
        &self,
        page_id: DbId,
        content: &str,
        title: &str,
        user_id: DbId,
    ) -> StoreResult<PageDraft> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let id = match t.drafts.get(&page_id) {
            Some(existing) => existing.id,
            None => t.next_id(),
        };
        let draft = PageDraft {
            id,
            page_id,
            content: content.to_string(),
            title: title.to_string(),
            last_modified_by: Some(user_id),
            last_modified_at: now,
        };
        t.drafts.insert(page_id, draft.clone());
        Ok(draft)
    }

    async fn delete_draft(&self, page_id: DbId) -> StoreResult<bool> {
        Ok(self.tables.write().await.drafts.remove(&page_id).is_some())
    }

    async fn upsert_session(
        &self,
        page_id: DbId,
        user_id: DbId,
        socket_id: &str,
        mode: SessionMode,
    ) -> StoreResult<EditingSession> {
        let mut t = self.tables.write().await;
        t.sessions.retain(|_, s| {
            s.socket_id != socket_id || (s.page_id == page_id && s.user_id == user_id)
        });

        let now = Utc::now();
        let existing = t
            .sessions
            .values()
            .find(|s| s.page_id == page_id && s.user_id == user_id)
            .map(|s| (s.id, s.created_at));
        let (id, created_at) = match existing {
            Some(found) => found,
            None => (t.next_id(), now),
        };
        let session = EditingSession {
            id,
            page_id,
            user_id,
            socket_id: socket_id.to_string(),
            mode: mode.as_str().to_string(),
            cursor_position: 0,
            selection_start: 0,
            selection_end: 0,
            last_activity: now,
            created_at,
        };
        t.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn find_session_by_socket(
        &self,
        socket_id: &str,
    ) -> StoreResult<Option<EditingSession>> {
        let t = self.tables.read().await;
        Ok(t.sessions
            .values()
            .find(|s| s.socket_id == socket_id)
            .cloned())
    }

    async fn delete_session_by_socket(
        &self,
        socket_id: &str,
    ) -> StoreResult<Option<EditingSession>> {
        let mut t = self.tables.write().await;
        Ok(t
            .session_id_by_socket(socket_id)
            .and_then(|id| t.sessions.remove(&id)))
    }

    async fn delete_session_by_page_user(
        &self,
        page_id: DbId,
        user_id: DbId,
    ) -> StoreResult<Option<EditingSession>> {
        let mut t = self.tables.write().await;
        let id = t
            .sessions
            .values()
            .find(|s| s.page_id == page_id && s.user_id == user_id)
            .map(|s| s.id);
        Ok(id.and_then(|id| t.sessions.remove(&id)))
    }

    async fn list_page_sessions(&self, page_id: DbId) -> StoreResult<Vec<SessionWithUser>> {
        let t = self.tables.read().await;
        let mut rows: Vec<SessionWithUser> = t
            .sessions
            .values()
            .filter(|s| s.page_id == page_id)
            .filter_map(|s| {
                let user = t.users.get(&s.user_id)?;
                Some(SessionWithUser {
                    page_id: s.page_id,
                    user_id: s.user_id,
                    socket_id: s.socket_id.clone(),
                    mode: s.mode.clone(),
                    cursor_position: s.cursor_position,
                    selection_start: s.selection_start,
                    selection_end: s.selection_end,
                    last_activity: s.last_activity,
                    username: user.username.clone(),
                    cursor_color: user.cursor_color.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(rows)
    }

    async fn touch_session(&self, socket_id: &str) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        match t.session_by_socket_mut(socket_id) {
            Some(session) => {
                session.last_activity = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_session_cursor(
        &self,
        socket_id: &str,
        position: i64,
        selection_start: i64,
        selection_end: i64,
    ) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        match t.session_by_socket_mut(socket_id) {
            Some(session) => {
                session.cursor_position = position;
                session.selection_start = selection_start;
                session.selection_end = selection_end;
                session.last_activity = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_session_mode(&self, socket_id: &str, mode: SessionMode) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        match t.session_by_socket_mut(socket_id) {
            Some(session) => {
                session.mode = mode.as_str().to_string();
                session.last_activity = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_stale_sessions(&self, cutoff: Timestamp) -> StoreResult<Vec<EditingSession>> {
        let mut t = self.tables.write().await;
        let stale: Vec<DbId> = t
            .sessions
            .values()
            .filter(|s| s.last_activity < cutoff)
            .map(|s| s.id)
            .collect();
        Ok(stale
            .into_iter()
            .filter_map(|id| t.sessions.remove(&id))
            .collect())
    }

    async fn list_active_sessions(&self) -> StoreResult<Vec<ActiveSession>> {
        let t = self.tables.read().await;
        let mut rows: Vec<ActiveSession> = t
            .sessions
            .values()
            .filter_map(|s| {
                let user = t.users.get(&s.user_id)?;
                let page = t.pages.get(&s.page_id)?;
                Some(ActiveSession {
                    page_id: s.page_id,
                    page_slug: page.slug.clone(),
                    page_title: page.title.clone(),
                    user_id: s.user_id,
                    username: user.username.clone(),
                    mode: s.mode.clone(),
                    last_activity: s.last_activity,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(rows)
    }
}
