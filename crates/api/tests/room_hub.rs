//! Unit tests for `RoomHub`, exercised directly without HTTP upgrades.

use axum::extract::ws::Message;
use tandem_api::ws::RoomHub;

fn text(msg: &str) -> Message {
    Message::Text(msg.into())
}

fn received_text(msg: Message) -> String {
    match msg {
        Message::Text(t) => t.as_str().to_string(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: add() and remove() track the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let hub = RoomHub::new();
    assert_eq!(hub.connection_count().await, 0);

    let _rx1 = hub.add("conn-1".to_string(), 1).await;
    let _rx2 = hub.add("conn-2".to_string(), 2).await;
    assert_eq!(hub.connection_count().await, 2);

    let removed = hub.remove("conn-1").await.expect("conn-1 was registered");
    assert_eq!(removed.user_id, 1);
    assert!(removed.connected_at <= chrono::Utc::now());
    assert!(hub.remove("nonexistent").await.is_none());
    assert_eq!(hub.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: broadcast() reaches room members except the excluded one
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_skips_excluded_and_non_members() {
    let hub = RoomHub::new();
    let mut rx1 = hub.add("conn-1".to_string(), 1).await;
    let mut rx2 = hub.add("conn-2".to_string(), 2).await;
    let mut rx3 = hub.add("conn-3".to_string(), 3).await;
    hub.join("page:1", "conn-1").await;
    hub.join("page:1", "conn-2").await;

    let sent = hub.broadcast("page:1", text("hello"), Some("conn-1")).await;
    assert_eq!(sent, 1);

    assert_eq!(received_text(rx2.recv().await.unwrap()), "hello");
    assert!(rx1.try_recv().is_err());
    assert!(rx3.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_without_exclusion_reaches_everyone() {
    let hub = RoomHub::new();
    let mut rx1 = hub.add("conn-1".to_string(), 1).await;
    let mut rx2 = hub.add("conn-2".to_string(), 2).await;
    hub.join("page:1", "conn-1").await;
    hub.join("page:1", "conn-2").await;

    assert_eq!(hub.broadcast("page:1", text("all"), None).await, 2);
    assert_eq!(received_text(rx1.recv().await.unwrap()), "all");
    assert_eq!(received_text(rx2.recv().await.unwrap()), "all");
}

// ---------------------------------------------------------------------------
// Test: frames to one connection keep their queue order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn frames_arrive_in_queue_order() {
    let hub = RoomHub::new();
    let mut rx = hub.add("conn-1".to_string(), 1).await;
    hub.join("page:1", "conn-1").await;

    for i in 0..20 {
        if i % 2 == 0 {
            hub.send_to("conn-1", text(&i.to_string())).await;
        } else {
            hub.broadcast("page:1", text(&i.to_string()), None).await;
        }
    }
    for i in 0..20 {
        assert_eq!(received_text(rx.recv().await.unwrap()), i.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test: room membership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_and_remove_drop_membership() {
    let hub = RoomHub::new();
    let _rx1 = hub.add("conn-1".to_string(), 1).await;
    let _rx2 = hub.add("conn-2".to_string(), 2).await;
    hub.join("page:1", "conn-1").await;
    hub.join("page:1", "conn-2").await;
    hub.join("admin-live", "conn-2").await;

    assert_eq!(hub.members("page:1").await, vec!["conn-1", "conn-2"]);
    assert!(hub.leave("page:1", "conn-1").await);
    assert!(!hub.leave("page:1", "conn-1").await);
    assert!(!hub.is_member("page:1", "conn-1").await);

    hub.remove("conn-2").await;
    assert!(hub.members("page:1").await.is_empty());
    assert!(!hub.is_member("admin-live", "conn-2").await);
}

#[tokio::test]
async fn send_to_unknown_connection_returns_false() {
    let hub = RoomHub::new();
    assert!(!hub.send_to("ghost", text("x")).await);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() closes every connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let hub = RoomHub::new();
    let mut rx1 = hub.add("conn-1".to_string(), 1).await;
    let mut rx2 = hub.add("conn-2".to_string(), 2).await;
    hub.join("page:1", "conn-1").await;

    hub.shutdown_all().await;

    assert!(matches!(rx1.recv().await, Some(Message::Close(None))));
    assert!(matches!(rx2.recv().await, Some(Message::Close(None))));
    assert_eq!(hub.connection_count().await, 0);
    assert!(hub.members("page:1").await.is_empty());
}

#[tokio::test]
async fn ping_all_pings_every_connection() {
    let hub = RoomHub::new();
    let mut rx = hub.add("conn-1".to_string(), 1).await;

    hub.ping_all().await;

    assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
}
