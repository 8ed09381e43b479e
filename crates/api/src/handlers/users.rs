//! Handlers for the current user's cursor color.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;
use tandem_core::error::CoreError;

#[derive(Debug, Serialize)]
pub struct ColorResponse {
    pub color: String,
}

/// Request body for `PUT /users/me/color`.
#[derive(Debug, Deserialize, Validate)]
pub struct SetColorRequest {
    #[validate(length(equal = 7))]
    pub color: String,
}

/// GET /api/v1/users/me/color
///
/// Assigns a palette color on first call.
pub async fn get_my_color(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<ColorResponse>>> {
    let color = state.collab.cursors().ensure_color(user.user_id).await?;
    Ok(Json(DataResponse {
        data: ColorResponse { color },
    }))
}

/// PUT /api/v1/users/me/color
pub async fn set_my_color(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<SetColorRequest>,
) -> AppResult<Json<DataResponse<ColorResponse>>> {
    input.validate().map_err(|e| {
        AppError::Core(CoreError::InvalidColor(format!(
            "'{}' is not a #rrggbb hex color: {e}",
            input.color
        )))
    })?;

    state
        .collab
        .cursors()
        .set_color(user.user_id, &input.color)
        .await?;
    tracing::info!(user_id = user.user_id, color = %input.color, "Cursor color changed");
    Ok(Json(DataResponse {
        data: ColorResponse { color: input.color },
    }))
}
