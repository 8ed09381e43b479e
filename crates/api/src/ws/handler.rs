use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::collab::{CollabServer, Connection};
use crate::error::AppError;
use crate::middleware::auth::token_from_headers;
use crate::state::AppState;

/// Query string accepted by the socket endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CollabQuery {
    /// Access token; browsers cannot set headers on a socket handshake.
    pub token: Option<String>,
}

/// GET /api/v1/ws/collab
///
/// Authenticates the handshake from `?token=`, the `Authorization` header
/// or the `token` cookie, in that order. Unauthenticated handshakes get a
/// 401 and are never upgraded.
pub async fn collab_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<CollabQuery>,
    headers: HeaderMap,
) -> Response {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| token_from_headers(&headers));

    match state.collab.authenticate(token.as_deref()).await {
        Ok(conn) => {
            let collab = Arc::clone(&state.collab);
            ws.on_upgrade(move |socket| handle_socket(socket, collab, conn))
                .into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "Refused collab handshake");
            AppError::from(e).into_response()
        }
    }
}

/// Drive one authenticated socket until it closes.
///
/// A spawned sender task drains the hub channel into the sink while the
/// current task feeds inbound frames to the dispatcher one at a time.
async fn handle_socket(socket: WebSocket, collab: Arc<CollabServer>, mut conn: Connection) {
    let mut rx = collab.attach(&conn).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn.id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => collab.handle_text(&mut conn, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn.id, "Pong received");
                collab.heartbeat(&conn).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(conn_id = %conn.id, "Ignoring binary frame");
            }
            Ok(Message::Ping(_)) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn.id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    collab.disconnect(conn).await;
    send_task.abort();
}
