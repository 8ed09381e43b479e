use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tandem_core::types::{DbId, Timestamp};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Authenticated user behind the connection.
    pub user_id: DbId,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Active socket connections and their room memberships.
///
/// Each connection has one unbounded outbound channel, so frames queued for
/// a connection by one task are delivered in the order they were queued.
pub struct RoomHub {
    connections: RwLock<HashMap<String, WsConnection>>,
    rooms: RwLock<HashMap<String, HashSet<String>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String, user_id: DbId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection and drop it from every room, returning it if it
    /// was registered.
    pub async fn remove(&self, conn_id: &str) -> Option<WsConnection> {
        let removed = self.connections.write().await.remove(conn_id);
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
        removed
    }

    pub async fn join(&self, room: &str, conn_id: &str) {
        self.rooms
            .write()
            .await
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Returns `true` if the connection was in the room.
    pub async fn leave(&self, room: &str, conn_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(conn_id);
        if members.is_empty() {
            rooms.remove(room);
        }
        removed
    }

    /// Connection ids currently in `room`, sorted.
    pub async fn members(&self, room: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .rooms
            .read()
            .await
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub async fn is_member(&self, room: &str, conn_id: &str) -> bool {
        self.rooms
            .read()
            .await
            .get(room)
            .is_some_and(|m| m.contains(conn_id))
    }

    /// Queue a message for one connection. Returns `false` if it is gone.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    /// Queue a message for every member of `room` except `except`.
    ///
    /// Returns the number of connections the message was queued for.
    /// Closed channels are skipped; they are cleaned up when their receive
    /// loop ends.
    pub async fn broadcast(&self, room: &str, message: Message, except: Option<&str>) -> usize {
        let targets = self.members(room).await;
        let conns = self.connections.read().await;
        let mut count = 0;
        for id in targets.iter().filter(|id| Some(id.as_str()) != except) {
            if let Some(conn) = conns.get(id) {
                if conn.sender.send(message.clone()).is_ok() {
                    count += 1;
                }
            }
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear all state.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        self.rooms.write().await.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}
