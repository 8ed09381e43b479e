//! The read path: published pages and their history.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tandem_core::markup;
use tandem_core::types::{DbId, Timestamp};
use tandem_db::models::page::Page;
use tandem_db::models::page_history::PageHistoryEntry;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// A published page as served to readers.
#[derive(Debug, Serialize)]
pub struct PageView {
    pub id: DbId,
    pub slug: String,
    pub title: String,
    /// Raw markup body.
    pub content: String,
    /// Rendered body.
    pub html: String,
    pub parent_id: Option<DbId>,
    pub updated_at: Timestamp,
    /// Whether an unpublished draft differs from this version.
    pub has_draft: bool,
    pub view_count: i64,
}

async fn live_page_by_slug(state: &AppState, slug: &str) -> AppResult<Page> {
    state
        .gateway
        .find_live_page_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Page '{slug}' not found")))
}

/// GET /api/v1/pages/{slug}
///
/// Anonymous reads are allowed. Every read is recorded as a view.
pub async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    user: Option<AuthUser>,
) -> AppResult<Json<DataResponse<PageView>>> {
    let page = live_page_by_slug(&state, &slug).await?;

    if let Err(e) = state
        .gateway
        .record_page_view(page.id, user.as_ref().map(|u| u.user_id))
        .await
    {
        tracing::warn!(page_id = page.id, error = %e, "Failed to record page view");
    }

    let has_draft = state.collab.drafts().has_changes(page.id).await?;
    let view_count = state.gateway.count_page_views(page.id).await?;
    let html = markup::render(&page.content);

    Ok(Json(DataResponse {
        data: PageView {
            id: page.id,
            slug: page.slug,
            title: page.title,
            content: page.content,
            html,
            parent_id: page.parent_id,
            updated_at: page.updated_at,
            has_draft,
            view_count,
        },
    }))
}

/// GET /api/v1/pages/{slug}/history
///
/// Newest entry first.
pub async fn list_history(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    _user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<PageHistoryEntry>>>> {
    let page = live_page_by_slug(&state, &slug).await?;
    let entries = state.gateway.list_page_history(page.id).await?;
    Ok(Json(DataResponse { data: entries }))
}
