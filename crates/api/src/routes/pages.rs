//! Route definitions for the `/pages` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::pages;
use crate::state::AppState;

/// Routes mounted at `/pages`.
///
/// ```text
/// GET /{slug}           -> get_page
/// GET /{slug}/history   -> list_history (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{slug}", get(pages::get_page))
        .route("/{slug}/history", get(pages::list_history))
}
