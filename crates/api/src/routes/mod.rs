pub mod admin;
pub mod auth;
pub mod health;
pub mod pages;
pub mod users;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws/collab                      collaboration socket
///
/// /auth/login                     login (public)
///
/// /pages/{slug}                   read a published page (public)
/// /pages/{slug}/history           publish history (requires auth)
///
/// /users/me/color                 get, set cursor color (requires auth)
///
/// /admin/sessions                 live editing sessions (admin only)
/// /admin/events                   recent audit events (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Collaboration socket.
        .route("/ws/collab", get(ws::collab_handler))
        .nest("/auth", auth::router())
        // The read path.
        .nest("/pages", pages::router())
        .nest("/users/me", users::router())
        // Operator views of presence and the audit feed.
        .nest("/admin", admin::router())
}
