//! Constraint behavior of the in-memory gateway.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use tandem_core::collaboration::SessionMode;
use tandem_db::models::page::CreatePage;
use tandem_db::models::page_history::{NewHistoryEntry, PublishPage, ACTION_EDIT};
use tandem_db::models::user::CreateUser;
use tandem_db::{Gateway, MemoryGateway, StoreError};

async fn seed() -> (MemoryGateway, i64, i64, i64) {
    let gw = MemoryGateway::new();
    let ann = gw
        .create_user(&CreateUser {
            username: "ann".into(),
            password_hash: "x".into(),
            role: "user".into(),
        })
        .await
        .unwrap();
    let bo = gw
        .create_user(&CreateUser {
            username: "bo".into(),
            password_hash: "x".into(),
            role: "user".into(),
        })
        .await
        .unwrap();
    let page = gw
        .create_page(&CreatePage {
            slug: "home".into(),
            title: "Home".into(),
            content: "hello".into(),
            parent_id: None,
            created_by: Some(ann.id),
        })
        .await
        .unwrap();
    (gw, ann.id, bo.id, page.id)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_username_conflicts() {
    let (gw, _, _, _) = seed().await;
    let result = gw
        .create_user(&CreateUser {
            username: "ann".into(),
            password_hash: "y".into(),
            role: "user".into(),
        })
        .await;
    assert_matches!(result, Err(StoreError::Conflict(_)));
}

#[tokio::test]
async fn ensure_color_keeps_first_winner() {
    let (gw, ann, _, _) = seed().await;
    let first = gw.ensure_user_color(ann, "#111111").await.unwrap();
    let second = gw.ensure_user_color(ann, "#222222").await.unwrap();
    assert_eq!(first.as_deref(), Some("#111111"));
    assert_eq!(second.as_deref(), Some("#111111"));
    assert_eq!(gw.ensure_user_color(999, "#333333").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn seeding_copies_live_page_once() {
    let (gw, ann, _, page) = seed().await;
    let seeded = gw.seed_draft_from_page(page).await.unwrap().unwrap();
    assert_eq!(seeded.content, "hello");
    assert_eq!(seeded.last_modified_by, None);

    gw.upsert_draft(page, "changed", "Home", ann).await.unwrap();
    let again = gw.seed_draft_from_page(page).await.unwrap().unwrap();
    assert_eq!(again.content, "changed");
    assert_eq!(again.id, seeded.id);
}

#[tokio::test]
async fn seeding_a_deleted_page_yields_nothing() {
    let (gw, _, _, page) = seed().await;
    assert!(gw.soft_delete_page(page).await);
    assert!(gw.seed_draft_from_page(page).await.unwrap().is_none());
    assert!(gw.find_live_page(page).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejoin_replaces_socket_and_resets_cursor() {
    let (gw, ann, _, page) = seed().await;
    gw.upsert_session(page, ann, "s1", SessionMode::Editing)
        .await
        .unwrap();
    gw.update_session_cursor("s1", 5, 2, 5).await.unwrap();

    let session = gw
        .upsert_session(page, ann, "s2", SessionMode::Viewing)
        .await
        .unwrap();
    assert_eq!(session.socket_id, "s2");
    assert_eq!(session.cursor_position, 0);
    assert_eq!(session.session_mode(), SessionMode::Viewing);
    assert_eq!(gw.session_count().await, 1);
    assert!(gw.find_session_by_socket("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn socket_moves_between_pages() {
    let (gw, ann, _, home) = seed().await;
    let other = gw
        .create_page(&CreatePage {
            slug: "other".into(),
            title: "Other".into(),
            content: String::new(),
            parent_id: None,
            created_by: None,
        })
        .await
        .unwrap();

    gw.upsert_session(home, ann, "s1", SessionMode::Editing)
        .await
        .unwrap();
    gw.upsert_session(other.id, ann, "s1", SessionMode::Editing)
        .await
        .unwrap();

    assert_eq!(gw.session_count().await, 1);
    assert!(gw.list_page_sessions(home).await.unwrap().is_empty());
    assert_eq!(gw.list_page_sessions(other.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stale_sessions_are_swept() {
    let (gw, ann, bo, page) = seed().await;
    gw.upsert_session(page, ann, "old", SessionMode::Editing)
        .await
        .unwrap();
    gw.upsert_session(page, bo, "fresh", SessionMode::Editing)
        .await
        .unwrap();
    gw.set_session_activity("old", Utc::now() - Duration::minutes(30))
        .await;

    let removed = gw
        .delete_stale_sessions(Utc::now() - Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].socket_id, "old");
    assert!(gw.touch_session("fresh").await.unwrap());
    assert!(!gw.touch_session("old").await.unwrap());
}

#[tokio::test]
async fn active_sessions_join_page_and_user() {
    let (gw, ann, _, page) = seed().await;
    gw.upsert_session(page, ann, "s1", SessionMode::Viewing)
        .await
        .unwrap();
    let active = gw.list_active_sessions().await.unwrap();
    assert_eq!(active.len(), 1);
    let snap = active[0].snapshot();
    assert_eq!(snap.page_slug, "home");
    assert_eq!(snap.username, "ann");
    assert_eq!(snap.mode, SessionMode::Viewing);
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_updates_page_appends_history_and_drops_draft() {
    let (gw, ann, _, page) = seed().await;
    gw.upsert_draft(page, "hello world", "Home", ann)
        .await
        .unwrap();

    let published = gw
        .publish_page(&PublishPage {
            page_id: page,
            title: "Home".into(),
            content: "hello world".into(),
            parent_id: None,
            history: Some(NewHistoryEntry {
                title: "Home".into(),
                content: "hello world".into(),
                previous_content: "hello".into(),
                diff: "- hello\n+ hello world\n".into(),
                user_id: ann,
                action_type: ACTION_EDIT,
            }),
        })
        .await
        .unwrap();

    assert_eq!(published.content, "hello world");
    assert!(gw.find_draft(page).await.unwrap().is_none());
    let history = gw.list_page_history(page).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_content.as_deref(), Some("hello"));
}

#[tokio::test]
async fn publish_can_move_page_to_root() {
    let (gw, _, _, home) = seed().await;
    let child = gw
        .create_page(&CreatePage {
            slug: "child".into(),
            title: "Child".into(),
            content: String::new(),
            parent_id: Some(home),
            created_by: None,
        })
        .await
        .unwrap();
    assert!(gw.is_ancestor_or_self(home, child.id).await.unwrap());
    assert!(!gw.is_ancestor_or_self(child.id, home).await.unwrap());

    let moved = gw
        .publish_page(&PublishPage {
            page_id: child.id,
            title: "Child".into(),
            content: String::new(),
            parent_id: Some(None),
            history: None,
        })
        .await
        .unwrap();
    assert_eq!(moved.parent_id, None);
}

#[tokio::test]
async fn publishing_a_deleted_page_fails() {
    let (gw, _, _, page) = seed().await;
    gw.soft_delete_page(page).await;
    let result = gw
        .publish_page(&PublishPage {
            page_id: page,
            title: "x".into(),
            content: "x".into(),
            parent_id: None,
            history: None,
        })
        .await;
    assert_matches!(result, Err(StoreError::NotFound { entity: "page", .. }));
}

#[tokio::test]
async fn slugs_are_unique_among_live_pages_only() {
    let (gw, _, _, home) = seed().await;
    let page = |slug: &str| CreatePage {
        slug: slug.into(),
        title: "Home again".into(),
        content: String::new(),
        parent_id: None,
        created_by: None,
    };

    let taken = gw.create_page(&page("home")).await;
    assert_matches!(taken, Err(StoreError::Conflict(_)));

    gw.soft_delete_page(home).await;
    let reused = gw.create_page(&page("home")).await.unwrap();
    assert_ne!(reused.id, home);
    assert_eq!(
        gw.find_live_page_by_slug("home").await.unwrap().map(|p| p.id),
        Some(reused.id)
    );
}
