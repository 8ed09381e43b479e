//! Route definitions for the current user.

use axum::routing::get;
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users/me`. All require auth.
///
/// ```text
/// GET /color   -> get_my_color
/// PUT /color   -> set_my_color
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/color",
        get(users::get_my_color).put(users::set_my_color),
    )
}
