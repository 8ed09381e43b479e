//! The Event Dispatcher for the `/collab` socket.
//!
//! [`CollabServer`] owns the draft, presence and cursor services plus the
//! room hub, and handles each connection's inbound frames to completion in
//! arrival order. Every outbound frame for a sender is queued before the
//! next inbound frame of that sender is processed, which gives per-sender
//! ordering in every room.

use std::sync::Arc;

use axum::extract::ws::Message;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use tandem_core::collaboration::{page_room, SessionMode, ADMIN_ROOM};
use tandem_core::diff::render_diff;
use tandem_core::protocol::{AuditEvent, AuditKind, ClientMessage, ErrorCode, ServerMessage};
use tandem_core::roles::is_admin;
use tandem_core::types::DbId;
use tandem_db::models::page_history::{NewHistoryEntry, PublishPage, ACTION_EDIT};
use tandem_db::Gateway;

use super::audit::AuditFeed;
use super::cursors::CursorRegistry;
use super::drafts::DraftStore;
use super::error::{CollabError, CollabResult};
use super::presence::PresenceRegistry;
use crate::auth::jwt::{validate_token, JwtConfig};
use crate::ws::RoomHub;

/// The authenticated user behind a connection.
#[derive(Debug, Clone)]
pub struct ConnectedUser {
    pub id: DbId,
    pub username: String,
    pub role: String,
    /// Stable cursor color, ensured at handshake.
    pub color: String,
}

/// The page a connection is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedPage {
    pub page_id: DbId,
    pub mode: SessionMode,
}

/// Per-connection dispatcher state. Owned by the connection's task.
#[derive(Debug)]
pub struct Connection {
    pub id: String,
    pub user: ConnectedUser,
    pub page: Option<JoinedPage>,
    pub admin_live: bool,
}

impl Connection {
    fn joined(&self, page_id: DbId) -> Option<JoinedPage> {
        self.page.filter(|p| p.page_id == page_id)
    }
}

pub struct CollabServer {
    gateway: Arc<dyn Gateway>,
    hub: Arc<RoomHub>,
    drafts: DraftStore,
    presence: PresenceRegistry,
    cursors: CursorRegistry,
    audit: AuditFeed,
    jwt: JwtConfig,
}

impl CollabServer {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        hub: Arc<RoomHub>,
        jwt: JwtConfig,
        audit_capacity: usize,
    ) -> Self {
        Self {
            drafts: DraftStore::new(Arc::clone(&gateway)),
            presence: PresenceRegistry::new(Arc::clone(&gateway)),
            cursors: CursorRegistry::new(Arc::clone(&gateway)),
            audit: AuditFeed::new(audit_capacity),
            gateway,
            hub,
            jwt,
        }
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn cursors(&self) -> &CursorRegistry {
        &self.cursors
    }

    pub fn audit(&self) -> &AuditFeed {
        &self.audit
    }

    pub fn hub(&self) -> &Arc<RoomHub> {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Verify a handshake token and load its user.
    ///
    /// Ensures the user has a cursor color. The returned connection is not
    /// yet registered with the hub; see [`attach`](Self::attach).
    pub async fn authenticate(&self, token: Option<&str>) -> CollabResult<Connection> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(CollabError::AuthRequired)?;
        let claims = validate_token(token, &self.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Rejected collab handshake token");
            CollabError::InvalidToken
        })?;
        let user = self
            .gateway
            .find_user(claims.sub)
            .await?
            .ok_or(CollabError::InvalidToken)?;
        let color = self.cursors.ensure_color(user.id).await?;

        Ok(Connection {
            id: Uuid::new_v4().to_string(),
            user: ConnectedUser {
                id: user.id,
                username: user.username,
                role: user.role,
                color,
            },
            page: None,
            admin_live: false,
        })
    }

    /// Register an authenticated connection with the hub and return its
    /// outbound channel.
    pub async fn attach(&self, conn: &Connection) -> mpsc::UnboundedReceiver<Message> {
        tracing::info!(conn_id = %conn.id, user_id = conn.user.id, "Collab connection ready");
        self.hub.add(conn.id.clone(), conn.user.id).await
    }

    /// Clean up after a closed socket.
    ///
    /// Runs the leave flow for the joined page, if any, and always reports
    /// `user-disconnected` on the audit channel.
    pub async fn disconnect(&self, mut conn: Connection) {
        let page = conn.page.take();
        if let Some(joined) = page {
            let room = page_room(joined.page_id);
            self.hub.leave(&room, &conn.id).await;
            match self.presence.leave_by_conn(&conn.id).await {
                Ok(Some(_)) => {
                    self.broadcast(
                        &room,
                        &ServerMessage::UserLeft {
                            page_id: joined.page_id,
                            user_id: conn.user.id,
                        },
                        None,
                    )
                    .await;
                }
                // Swept, or a newer connection of the same user owns the session.
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(conn_id = %conn.id, error = %e, "Failed to drop session on disconnect");
                }
            }
        }

        self.emit_audit(
            AuditKind::UserDisconnected,
            &conn.user,
            page.map(|p| p.page_id),
            None,
        )
        .await;
        let connected_secs = self
            .hub
            .remove(&conn.id)
            .await
            .map(|c| (Utc::now() - c.connected_at).num_seconds())
            .unwrap_or_default();
        tracing::info!(conn_id = %conn.id, user_id = conn.user.id, connected_secs, "Collab connection closed");
    }

    /// Count a transport-level heartbeat (pong) as activity on the joined
    /// page, so idle but connected viewers are not swept.
    pub async fn heartbeat(&self, conn: &Connection) {
        let Some(joined) = conn.page else { return };
        match self.ensure_session(conn, joined).await {
            Ok(()) | Err(CollabError::Superseded(_)) => {}
            Err(e) => {
                tracing::warn!(conn_id = %conn.id, error = %e, "Failed to record heartbeat");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound routing
    // -----------------------------------------------------------------------

    /// Parse and handle one text frame.
    pub async fn handle_text(&self, conn: &mut Connection, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle(conn, msg).await,
            Err(e) => {
                tracing::debug!(conn_id = %conn.id, error = %e, "Malformed collab frame");
                self.send(
                    &conn.id,
                    &ServerMessage::error(ErrorCode::InvalidRequest, format!("Invalid message: {e}")),
                )
                .await;
            }
        }
    }

    /// Handle one parsed message. Failures become an `error` frame to the
    /// sender; the connection stays open.
    pub async fn handle(&self, conn: &mut Connection, msg: ClientMessage) {
        let kind = msg.kind();

        // Page-scoped messages for a page this connection is not on are dropped.
        if let Some(page_id) = msg.page_id() {
            let is_join = matches!(msg, ClientMessage::JoinPage { .. });
            if !is_join && conn.joined(page_id).is_none() {
                tracing::debug!(conn_id = %conn.id, page_id, kind, "Dropping message for unjoined page");
                return;
            }
        }

        let (result, transient) = match msg {
            ClientMessage::JoinPage { page_id, mode } => {
                (self.join_page(conn, page_id, mode).await, ErrorCode::JoinError)
            }
            ClientMessage::LeavePage { page_id } => {
                (self.leave_page(conn, page_id).await, ErrorCode::JoinError)
            }
            ClientMessage::ContentChange {
                page_id,
                content,
                title,
            } => (
                self.content_change(conn, page_id, content, title).await,
                ErrorCode::SyncError,
            ),
            ClientMessage::CursorMove {
                page_id,
                position,
                selection_start,
                selection_end,
            } => (
                self.cursor_move(conn, page_id, position, selection_start, selection_end)
                    .await,
                ErrorCode::SyncError,
            ),
            ClientMessage::Publish { page_id, parent_id } => (
                self.publish(conn, page_id, parent_id).await,
                ErrorCode::PublishError,
            ),
            ClientMessage::Revert { page_id } => {
                (self.revert(conn, page_id).await, ErrorCode::RevertError)
            }
            ClientMessage::JoinAdminLive => (self.join_admin_live(conn).await, ErrorCode::JoinError),
            ClientMessage::LeaveAdminLive => {
                (self.leave_admin_live(conn).await, ErrorCode::JoinError)
            }
        };

        if let Err(err) = result {
            match &err {
                CollabError::Store(e) => {
                    tracing::error!(conn_id = %conn.id, user_id = conn.user.id, kind, error = %e, "Collab handler failed");
                }
                other => {
                    tracing::debug!(conn_id = %conn.id, user_id = conn.user.id, kind, error = %other, "Collab request rejected");
                }
            }
            self.send(&conn.id, &err.to_frame(transient)).await;
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    async fn join_page(
        &self,
        conn: &mut Connection,
        page_id: DbId,
        mode: SessionMode,
    ) -> CollabResult<()> {
        self.gateway
            .find_live_page(page_id)
            .await?
            .ok_or(CollabError::PageNotFound(page_id))?;

        match conn.page {
            Some(current) if current.page_id == page_id => {
                if !self.presence.set_mode(&conn.id, mode).await? {
                    self.presence
                        .join(page_id, conn.user.id, &conn.id, mode)
                        .await?;
                }
            }
            Some(current) => {
                self.leave_current(conn, current).await?;
                self.presence
                    .join(page_id, conn.user.id, &conn.id, mode)
                    .await?;
            }
            None => {
                self.presence
                    .join(page_id, conn.user.id, &conn.id, mode)
                    .await?;
            }
        }

        let room = page_room(page_id);
        self.hub.join(&room, &conn.id).await;
        conn.page = Some(JoinedPage { page_id, mode });

        let draft = self.drafts.get_or_create(page_id).await?;
        let presence = self
            .presence
            .list_page(page_id)
            .await?
            .iter()
            .map(|s| s.presence_entry())
            .collect();
        let cursors = self.cursors.list_page(page_id).await?;
        let has_draft = self.drafts.has_changes(page_id).await?;

        self.send(
            &conn.id,
            &ServerMessage::Joined {
                page_id,
                mode,
                color: conn.user.color.clone(),
                draft: draft.snapshot(),
                presence,
                cursors,
                has_draft,
            },
        )
        .await;
        self.broadcast(
            &room,
            &ServerMessage::UserJoined {
                page_id,
                user_id: conn.user.id,
                username: conn.user.username.clone(),
                color: conn.user.color.clone(),
                mode,
            },
            Some(&conn.id),
        )
        .await;

        tracing::info!(conn_id = %conn.id, user_id = conn.user.id, page_id, mode = %mode, "Joined page");
        self.emit_audit(AuditKind::UserJoinedPage, &conn.user, Some(page_id), Some(mode))
            .await;
        Ok(())
    }

    async fn leave_page(&self, conn: &mut Connection, page_id: DbId) -> CollabResult<()> {
        match conn.joined(page_id) {
            Some(current) => self.leave_current(conn, current).await,
            None => Ok(()),
        }
    }

    /// The leave flow shared by `leave-page` and cross-page joins.
    async fn leave_current(&self, conn: &mut Connection, current: JoinedPage) -> CollabResult<()> {
        let room = page_room(current.page_id);
        self.hub.leave(&room, &conn.id).await;
        conn.page = None;
        self.presence
            .leave_by_page(current.page_id, conn.user.id)
            .await?;

        self.broadcast(
            &room,
            &ServerMessage::UserLeft {
                page_id: current.page_id,
                user_id: conn.user.id,
            },
            Some(&conn.id),
        )
        .await;

        tracing::info!(conn_id = %conn.id, user_id = conn.user.id, page_id = current.page_id, "Left page");
        self.emit_audit(
            AuditKind::UserLeftPage,
            &conn.user,
            Some(current.page_id),
            Some(current.mode),
        )
        .await;
        Ok(())
    }

    async fn content_change(
        &self,
        conn: &mut Connection,
        page_id: DbId,
        content: String,
        title: Option<String>,
    ) -> CollabResult<()> {
        let joined = require_editing(conn, page_id)?;
        self.ensure_session(conn, joined).await?;

        let title = match title {
            Some(title) => title,
            None => self.current_title(page_id).await?,
        };

        let draft = self
            .drafts
            .update(page_id, &content, &title, conn.user.id)
            .await?;

        self.broadcast(
            &page_room(page_id),
            &ServerMessage::ContentUpdated {
                page_id,
                content,
                title,
                user_id: conn.user.id,
                username: conn.user.username.clone(),
            },
            Some(&conn.id),
        )
        .await;
        self.send(
            &conn.id,
            &ServerMessage::DraftSaved {
                page_id,
                saved_at: draft.last_modified_at,
            },
        )
        .await;

        tracing::debug!(conn_id = %conn.id, user_id = conn.user.id, page_id, "Draft saved");
        self.emit_audit(AuditKind::DraftSaved, &conn.user, Some(page_id), None)
            .await;
        Ok(())
    }

    async fn cursor_move(
        &self,
        conn: &mut Connection,
        page_id: DbId,
        position: i64,
        selection_start: Option<i64>,
        selection_end: Option<i64>,
    ) -> CollabResult<()> {
        let joined = conn.joined(page_id).ok_or_else(not_joined)?;
        // Viewer cursors are never shown, but the move still counts as activity.
        if !joined.mode.is_editing() {
            return self.ensure_session(conn, joined).await;
        }

        let position = position.max(0);
        let selection_start = selection_start.unwrap_or(position).max(0);
        let selection_end = selection_end.unwrap_or(position).max(0);

        let updated = self
            .cursors
            .update(&conn.id, position, selection_start, selection_end)
            .await?;
        if !updated {
            self.ensure_session(conn, joined).await?;
            self.cursors
                .update(&conn.id, position, selection_start, selection_end)
                .await?;
        }

        self.broadcast(
            &page_room(page_id),
            &ServerMessage::CursorUpdated {
                page_id,
                user_id: conn.user.id,
                position,
                selection_start,
                selection_end,
            },
            Some(&conn.id),
        )
        .await;
        Ok(())
    }

    async fn publish(
        &self,
        conn: &mut Connection,
        page_id: DbId,
        parent_id: Option<Option<DbId>>,
    ) -> CollabResult<()> {
        require_editing(conn, page_id)?;
        let page = self
            .gateway
            .find_live_page(page_id)
            .await?
            .ok_or(CollabError::PageNotFound(page_id))?;
        let draft = self.drafts.get(page_id).await?;

        let parent_change = parent_id.filter(|new| *new != page.parent_id);
        if draft.is_none() && parent_change.is_none() {
            return Err(CollabError::NoDraft(page_id));
        }
        if let Some(Some(new_parent)) = parent_change {
            self.validate_parent(page_id, new_parent).await?;
        }

        let (title, content) = match &draft {
            Some(d) => (d.title.clone(), d.content.clone()),
            None => (page.title.clone(), page.content.clone()),
        };
        let history = draft
            .as_ref()
            .filter(|d| d.content != page.content)
            .map(|d| NewHistoryEntry {
                title: d.title.clone(),
                content: d.content.clone(),
                previous_content: page.content.clone(),
                diff: render_diff(&page.content, &d.content),
                user_id: conn.user.id,
                action_type: ACTION_EDIT,
            });

        let published = self
            .gateway
            .publish_page(&PublishPage {
                page_id,
                title,
                content,
                parent_id: parent_change,
                history,
            })
            .await?;

        self.broadcast(
            &page_room(page_id),
            &ServerMessage::Published {
                page_id,
                published_at: published.updated_at,
                published_by: conn.user.username.clone(),
                user_id: conn.user.id,
            },
            None,
        )
        .await;

        tracing::info!(conn_id = %conn.id, user_id = conn.user.id, page_id, "Page published");
        self.emit_audit(AuditKind::PagePublished, &conn.user, Some(page_id), None)
            .await;
        Ok(())
    }

    async fn revert(&self, conn: &mut Connection, page_id: DbId) -> CollabResult<()> {
        require_editing(conn, page_id)?;
        let page = self
            .gateway
            .find_live_page(page_id)
            .await?
            .ok_or(CollabError::PageNotFound(page_id))?;
        self.drafts.delete(page_id).await?;

        self.broadcast(
            &page_room(page_id),
            &ServerMessage::Reverted {
                page_id,
                content: page.content,
                title: page.title,
                reverted_by: conn.user.username.clone(),
                user_id: conn.user.id,
            },
            None,
        )
        .await;

        tracing::info!(conn_id = %conn.id, user_id = conn.user.id, page_id, "Draft reverted");
        self.emit_audit(AuditKind::PageReverted, &conn.user, Some(page_id), None)
            .await;
        Ok(())
    }

    async fn join_admin_live(&self, conn: &mut Connection) -> CollabResult<()> {
        require_admin(conn)?;
        self.hub.join(ADMIN_ROOM, &conn.id).await;
        conn.admin_live = true;

        let sessions = self.presence.list_active().await?;
        let recent_events = self.audit.recent().await;
        self.send(
            &conn.id,
            &ServerMessage::AdminInit {
                sessions,
                recent_events,
            },
        )
        .await;
        Ok(())
    }

    async fn leave_admin_live(&self, conn: &mut Connection) -> CollabResult<()> {
        require_admin(conn)?;
        self.hub.leave(ADMIN_ROOM, &conn.id).await;
        conn.admin_live = false;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Title to keep when a content change omits one.
    async fn current_title(&self, page_id: DbId) -> CollabResult<String> {
        if let Some(draft) = self.drafts.get(page_id).await? {
            return Ok(draft.title);
        }
        self.gateway
            .find_live_page(page_id)
            .await?
            .map(|p| p.title)
            .ok_or(CollabError::PageNotFound(page_id))
    }

    /// Bump activity, re-creating the session if the janitor swept it.
    ///
    /// Fails with `Superseded` when a newer connection of the same user has
    /// taken over the (page, user) session.
    async fn ensure_session(&self, conn: &Connection, joined: JoinedPage) -> CollabResult<()> {
        if self.presence.bump_activity(&conn.id).await? {
            return Ok(());
        }
        let taken = self
            .presence
            .list_page(joined.page_id)
            .await?
            .iter()
            .any(|s| s.user_id == conn.user.id);
        if taken {
            return Err(CollabError::Superseded(joined.page_id));
        }
        tracing::debug!(conn_id = %conn.id, page_id = joined.page_id, "Re-creating swept session");
        self.presence
            .join(joined.page_id, conn.user.id, &conn.id, joined.mode)
            .await?;
        Ok(())
    }

    /// A new parent must be live and must not be the page or a descendant.
    async fn validate_parent(&self, page_id: DbId, parent_id: DbId) -> CollabResult<()> {
        if parent_id == page_id {
            return Err(CollabError::InvalidRequest(
                "A page cannot be its own parent".into(),
            ));
        }
        if self.gateway.find_live_page(parent_id).await?.is_none() {
            return Err(CollabError::InvalidRequest(format!(
                "Parent page {parent_id} does not exist"
            )));
        }
        if self.gateway.is_ancestor_or_self(page_id, parent_id).await? {
            return Err(CollabError::InvalidRequest(
                "A page cannot be moved under its own descendant".into(),
            ));
        }
        Ok(())
    }

    async fn emit_audit(
        &self,
        event: AuditKind,
        user: &ConnectedUser,
        page_id: Option<DbId>,
        mode: Option<SessionMode>,
    ) {
        let event = AuditEvent {
            event,
            timestamp: Utc::now(),
            user_id: user.id,
            username: user.username.clone(),
            page_id,
            mode,
        };
        self.audit.push(event.clone()).await;
        self.broadcast(ADMIN_ROOM, &ServerMessage::AdminEvent(event), None)
            .await;
    }

    async fn send(&self, conn_id: &str, msg: &ServerMessage) {
        if let Some(frame) = encode(msg) {
            self.hub.send_to(conn_id, frame).await;
        }
    }

    async fn broadcast(&self, room: &str, msg: &ServerMessage, except: Option<&str>) {
        if let Some(frame) = encode(msg) {
            self.hub.broadcast(room, frame, except).await;
        }
    }
}

fn not_joined() -> CollabError {
    CollabError::InvalidRequest("Not joined to this page".into())
}

/// Content, publish and revert are reserved for editing sessions.
fn require_editing(conn: &Connection, page_id: DbId) -> CollabResult<JoinedPage> {
    let joined = conn.joined(page_id).ok_or_else(not_joined)?;
    if joined.mode.is_editing() {
        Ok(joined)
    } else {
        Err(CollabError::Forbidden(
            "Viewing sessions cannot modify the page".into(),
        ))
    }
}

fn require_admin(conn: &Connection) -> CollabResult<()> {
    if is_admin(&conn.user.role) {
        Ok(())
    } else {
        Err(CollabError::Forbidden("Admin role required".into()))
    }
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode collab frame");
            None
        }
    }
}
