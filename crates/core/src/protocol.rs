//! JSON frames exchanged over the `/collab` socket.
//!
//! Both directions are internally tagged on `"type"` with kebab-case tags
//! and camelCase fields, so the browser can route frames by type string.

use std::collections::BTreeMap;
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::collaboration::SessionMode;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Messages a client sends to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinPage {
        page_id: DbId,
        #[serde(default)]
        mode: SessionMode,
    },
    LeavePage {
        page_id: DbId,
    },
    ContentChange {
        page_id: DbId,
        content: String,
        #[serde(default)]
        title: Option<String>,
    },
    CursorMove {
        page_id: DbId,
        position: i64,
        #[serde(default)]
        selection_start: Option<i64>,
        #[serde(default)]
        selection_end: Option<i64>,
    },
    Publish {
        page_id: DbId,
        /// Absent: keep the parent. `null`: move to the root.
        #[serde(
            default,
            deserialize_with = "present_or_null",
            skip_serializing_if = "Option::is_none"
        )]
        parent_id: Option<Option<DbId>>,
    },
    Revert {
        page_id: DbId,
    },
    JoinAdminLive,
    LeaveAdminLive,
}

impl ClientMessage {
    /// The wire tag, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinPage { .. } => "join-page",
            Self::LeavePage { .. } => "leave-page",
            Self::ContentChange { .. } => "content-change",
            Self::CursorMove { .. } => "cursor-move",
            Self::Publish { .. } => "publish",
            Self::Revert { .. } => "revert",
            Self::JoinAdminLive => "join-admin-live",
            Self::LeaveAdminLive => "leave-admin-live",
        }
    }

    /// The page a message targets, if it targets one.
    pub fn page_id(&self) -> Option<DbId> {
        match self {
            Self::JoinPage { page_id, .. }
            | Self::LeavePage { page_id }
            | Self::ContentChange { page_id, .. }
            | Self::CursorMove { page_id, .. }
            | Self::Publish { page_id, .. }
            | Self::Revert { page_id } => Some(*page_id),
            Self::JoinAdminLive | Self::LeaveAdminLive => None,
        }
    }
}

/// Distinguish an explicit `null` from an absent field.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<DbId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DbId>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Outbound payload types
// ---------------------------------------------------------------------------

/// The shared working copy as sent to joining editors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub content: String,
    pub title: String,
    pub last_modified_by: Option<DbId>,
    pub last_modified_at: Timestamp,
}

/// One entry of the "who is here" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: DbId,
    pub username: String,
    pub color: Option<String>,
    pub mode: SessionMode,
    pub last_activity: Timestamp,
}

/// Cursor and selection of one editing user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorState {
    pub position: i64,
    pub selection_start: i64,
    pub selection_end: i64,
    pub username: String,
    pub color: Option<String>,
}

/// A live session as seen by the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub page_id: DbId,
    pub page_slug: String,
    pub page_title: String,
    pub user_id: DbId,
    pub username: String,
    pub mode: SessionMode,
    pub last_activity: Timestamp,
}

/// Kinds of state change reported on the audit channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    UserJoinedPage,
    UserLeftPage,
    UserDisconnected,
    DraftSaved,
    PagePublished,
    PageReverted,
}

/// A tagged state-change event for operator dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event: AuditKind,
    pub timestamp: Timestamp,
    pub user_id: DbId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
}

/// Machine-readable code carried by every `error` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    PageNotFound,
    NoDraft,
    Forbidden,
    InvalidColor,
    JoinError,
    SyncError,
    PublishError,
    RevertError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::PageNotFound => "PAGE_NOT_FOUND",
            Self::NoDraft => "NO_DRAFT",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidColor => "INVALID_COLOR",
            Self::JoinError => "JOIN_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::PublishError => "PUBLISH_ERROR",
            Self::RevertError => "REVERT_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Frames the dispatcher sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Joined {
        page_id: DbId,
        mode: SessionMode,
        color: String,
        draft: DraftSnapshot,
        presence: Vec<PresenceEntry>,
        #[serde(deserialize_with = "cursor_map")]
        cursors: BTreeMap<DbId, CursorState>,
        has_draft: bool,
    },
    UserJoined {
        page_id: DbId,
        user_id: DbId,
        username: String,
        color: String,
        mode: SessionMode,
    },
    UserLeft {
        page_id: DbId,
        user_id: DbId,
    },
    ContentUpdated {
        page_id: DbId,
        content: String,
        title: String,
        user_id: DbId,
        username: String,
    },
    CursorUpdated {
        page_id: DbId,
        user_id: DbId,
        position: i64,
        selection_start: i64,
        selection_end: i64,
    },
    DraftSaved {
        page_id: DbId,
        saved_at: Timestamp,
    },
    Published {
        page_id: DbId,
        published_at: Timestamp,
        published_by: String,
        user_id: DbId,
    },
    Reverted {
        page_id: DbId,
        content: String,
        title: String,
        reverted_by: String,
        user_id: DbId,
    },
    AdminInit {
        sessions: Vec<SessionSnapshot>,
        recent_events: Vec<AuditEvent>,
    },
    AdminEvent(AuditEvent),
    Error {
        message: String,
        code: ErrorCode,
    },
}

/// JSON object keys are strings; buffered (internally tagged) content will
/// not coerce them back to integers on its own.
fn cursor_map<'de, D>(deserializer: D) -> Result<BTreeMap<DbId, CursorState>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, CursorState>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, cursor)| {
            key.parse::<DbId>()
                .map(|user_id| (user_id, cursor))
                .map_err(|_| de::Error::custom(format!("invalid user id key {key:?}")))
        })
        .collect()
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn join_page_parses_with_default_mode() {
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "join-page", "pageId": 42 })).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinPage {
                page_id: 42,
                mode: SessionMode::Editing
            }
        );
    }

    #[test]
    fn content_change_parses_camel_case_fields() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "content-change",
            "pageId": 7,
            "content": "hello",
            "title": "Greeting"
        }))
        .unwrap();
        assert_eq!(msg.kind(), "content-change");
        assert_eq!(msg.page_id(), Some(7));
    }

    #[test]
    fn missing_page_id_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({ "type": "revert" }));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({ "type": "delete-everything", "pageId": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn publish_distinguishes_absent_and_null_parent() {
        let absent: ClientMessage =
            serde_json::from_value(json!({ "type": "publish", "pageId": 1 })).unwrap();
        let null: ClientMessage =
            serde_json::from_value(json!({ "type": "publish", "pageId": 1, "parentId": null }))
                .unwrap();
        let set: ClientMessage =
            serde_json::from_value(json!({ "type": "publish", "pageId": 1, "parentId": 9 }))
                .unwrap();

        assert_eq!(
            absent,
            ClientMessage::Publish {
                page_id: 1,
                parent_id: None
            }
        );
        assert_eq!(
            null,
            ClientMessage::Publish {
                page_id: 1,
                parent_id: Some(None)
            }
        );
        assert_eq!(
            set,
            ClientMessage::Publish {
                page_id: 1,
                parent_id: Some(Some(9))
            }
        );
    }

    #[test]
    fn admin_messages_have_no_payload() {
        let msg: ClientMessage =
            serde_json::from_value(json!({ "type": "join-admin-live" })).unwrap();
        assert_eq!(msg, ClientMessage::JoinAdminLive);
        assert_eq!(msg.page_id(), None);
    }

    #[test]
    fn error_frame_shape() {
        let frame = ServerMessage::error(ErrorCode::NoDraft, "nothing to publish");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({ "type": "error", "message": "nothing to publish", "code": "NO_DRAFT" })
        );
    }

    #[test]
    fn admin_event_is_flattened_under_its_tag() {
        let event = AuditEvent {
            event: AuditKind::DraftSaved,
            timestamp: chrono::Utc::now(),
            user_id: 3,
            username: "ann".into(),
            page_id: Some(42),
            mode: None,
        };
        let value = serde_json::to_value(ServerMessage::AdminEvent(event)).unwrap();
        assert_eq!(value["type"], "admin-event");
        assert_eq!(value["event"], "draft-saved");
        assert_eq!(value["pageId"], 42);
        assert!(value.get("mode").is_none());
    }

    #[test]
    fn cursor_map_uses_user_ids_as_keys() {
        let mut cursors = BTreeMap::new();
        cursors.insert(
            5,
            CursorState {
                position: 3,
                selection_start: 3,
                selection_end: 3,
                username: "bo".into(),
                color: Some("#000075".into()),
            },
        );
        let value = serde_json::to_value(&cursors).unwrap();
        assert_eq!(value["5"]["selectionEnd"], 3);
        let back: BTreeMap<DbId, CursorState> = serde_json::from_value(value).unwrap();
        assert_eq!(back, cursors);
    }

    #[test]
    fn joined_frame_with_cursors_parses_back() {
        let mut cursors = BTreeMap::new();
        cursors.insert(
            5,
            CursorState {
                position: 4,
                selection_start: 2,
                selection_end: 4,
                username: "bo".into(),
                color: Some("#3cb44b".into()),
            },
        );
        let frame = ServerMessage::Joined {
            page_id: 42,
            mode: SessionMode::Editing,
            color: "#e6194b".into(),
            draft: DraftSnapshot {
                content: "abcd".into(),
                title: "Page".into(),
                last_modified_by: Some(5),
                last_modified_at: chrono::Utc::now(),
            },
            presence: Vec::new(),
            cursors,
            has_draft: true,
        };

        let text = serde_json::to_string(&frame).unwrap();
        let back: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn joined_frame_rejects_non_numeric_cursor_keys() {
        let value = json!({
            "type": "joined",
            "pageId": 1,
            "mode": "editing",
            "color": "#e6194b",
            "draft": {
                "content": "",
                "title": "",
                "lastModifiedBy": null,
                "lastModifiedAt": "2026-01-01T00:00:00Z"
            },
            "presence": [],
            "cursors": {
                "bo": {
                    "position": 0,
                    "selectionStart": 0,
                    "selectionEnd": 0,
                    "username": "bo",
                    "color": null
                }
            },
            "hasDraft": false
        });
        assert!(serde_json::from_value::<ServerMessage>(value).is_err());
    }
}
