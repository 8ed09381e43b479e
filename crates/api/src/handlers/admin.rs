//! Admin-only snapshots of the collaboration state.

use axum::extract::State;
use axum::Json;
use tandem_core::protocol::{AuditEvent, SessionSnapshot};

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/admin/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<SessionSnapshot>>>> {
    let sessions = state.collab.presence().list_active().await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// GET /api/v1/admin/events
///
/// The retained audit feed, oldest first.
pub async fn list_events(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<AuditEvent>>>> {
    Ok(Json(DataResponse {
        data: state.collab.audit().recent().await,
    }))
}
