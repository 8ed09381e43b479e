//! Shared helpers for the API integration tests.
//!
//! Everything runs against [`MemoryGateway`], so no database is needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

use tandem_api::auth::jwt::{generate_access_token, JwtConfig};
use tandem_api::auth::password::hash_password;
use tandem_api::collab::{CollabServer, Connection};
use tandem_api::config::{CollabConfig, LogFormat, ServerConfig, StorageBackend};
use tandem_api::router::build_app_router;
use tandem_api::state::AppState;
use tandem_core::protocol::{ClientMessage, ServerMessage};
use tandem_core::roles::{ROLE_ADMIN, ROLE_USER};
use tandem_core::types::DbId;
use tandem_db::models::page::{CreatePage, Page};
use tandem_db::models::user::{CreateUser, User};
use tandem_db::{Gateway, MemoryGateway};

pub const TEST_PASSWORD: &str = "correct horse battery staple";
pub const ORIGINAL_BODY: &str = "original body";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        storage: StorageBackend::Memory,
        database_url: None,
        log_format: LogFormat::Pretty,
        jwt: JwtConfig {
            secret: "test-secret-do-not-use-in-production".to_string(),
            access_token_expiry_mins: 15,
        },
        collab: CollabConfig::default(),
        bootstrap_admin: None,
    }
}

/// App state over a fresh in-memory gateway.
pub fn test_state() -> (AppState, Arc<MemoryGateway>) {
    let memory = Arc::new(MemoryGateway::new());
    let gateway: Arc<dyn Gateway> = memory.clone();
    (AppState::new(gateway, test_config()), memory)
}

/// Build the full application router, sharing the middleware stack with
/// `main.rs`.
pub fn build_test_app(state: AppState) -> Router {
    let config = test_config();
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

pub async fn create_user(gateway: &MemoryGateway, username: &str, role: &str) -> User {
    let password_hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    gateway
        .create_user(&CreateUser {
            username: username.to_string(),
            password_hash,
            role: role.to_string(),
        })
        .await
        .expect("user creation should succeed")
}

pub async fn create_editor(gateway: &MemoryGateway, username: &str) -> User {
    create_user(gateway, username, ROLE_USER).await
}

pub async fn create_admin(gateway: &MemoryGateway, username: &str) -> User {
    create_user(gateway, username, ROLE_ADMIN).await
}

pub async fn create_page(
    gateway: &MemoryGateway,
    slug: &str,
    parent_id: Option<DbId>,
) -> Page {
    gateway
        .create_page(&CreatePage {
            slug: slug.to_string(),
            title: format!("Title of {slug}"),
            content: ORIGINAL_BODY.to_string(),
            parent_id,
            created_by: None,
        })
        .await
        .expect("page creation should succeed")
}

pub fn token_for(state: &AppState, user: &User) -> String {
    generate_access_token(user.id, &user.role, &state.config.jwt)
        .expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Collab clients
// ---------------------------------------------------------------------------

/// A connection driven directly against the dispatcher, with its outbound
/// channel.
pub struct TestClient {
    pub conn: Connection,
    pub rx: UnboundedReceiver<Message>,
}

impl TestClient {
    pub async fn connect(state: &AppState, user: &User) -> Self {
        let token = token_for(state, user);
        let conn = state
            .collab
            .authenticate(Some(&token))
            .await
            .expect("handshake should succeed");
        let rx = state.collab.attach(&conn).await;
        Self { conn, rx }
    }

    pub fn user_id(&self) -> DbId {
        self.conn.user.id
    }

    pub async fn send(&mut self, collab: &CollabServer, msg: ClientMessage) {
        collab.handle(&mut self.conn, msg).await;
    }

    pub async fn send_raw(&mut self, collab: &CollabServer, text: &str) {
        collab.handle_text(&mut self.conn, text).await;
    }

    /// All frames queued so far. Handlers queue their frames before
    /// returning, so nothing is in flight once `send` has completed.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut frames = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            if let Some(frame) = parse_frame(msg) {
                frames.push(frame);
            }
        }
        frames
    }

    pub async fn disconnect(self, collab: &CollabServer) {
        collab.disconnect(self.conn).await;
    }
}

pub fn parse_frame(msg: Message) -> Option<ServerMessage> {
    match msg {
        Message::Text(text) => {
            Some(serde_json::from_str(text.as_str()).expect("server frames are valid JSON"))
        }
        _ => None,
    }
}

pub fn join(page_id: DbId) -> ClientMessage {
    ClientMessage::JoinPage {
        page_id,
        mode: tandem_core::collaboration::SessionMode::Editing,
    }
}

pub fn edit(page_id: DbId, content: &str) -> ClientMessage {
    ClientMessage::ContentChange {
        page_id,
        content: content.to_string(),
        title: None,
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    app.oneshot(request).await.expect("infallible")
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("valid request");
    app.oneshot(request).await.expect("infallible")
}

pub async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(body.to_string()))
        .expect("valid request");
    app.oneshot(request).await.expect("infallible")
}
