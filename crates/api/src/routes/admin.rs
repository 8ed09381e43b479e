//! Route definitions for the `/admin` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET /sessions   -> list_sessions
/// GET /events     -> list_events
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(admin::list_sessions))
        .route("/events", get(admin::list_events))
}
