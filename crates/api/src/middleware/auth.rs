//! JWT-based authentication extractor for Axum handlers.

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tandem_core::error::CoreError;
use tandem_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Name of the cookie that may carry the access token.
pub const TOKEN_COOKIE: &str = "token";

/// Authenticated user extracted from the request.
///
/// The token is taken from `Authorization: Bearer <token>`, falling back to
/// the `token` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    /// The user's role name (`"admin"` or `"user"`).
    pub role: String,
}

/// Pull an access token from the `Authorization` header or the token cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());
    bearer.or_else(|| cookie_value(headers, TOKEN_COOKIE))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let claims = validate_token(token, &state.config.jwt)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid or expired token".into())))?;
    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing bearer token or token cookie".into(),
            ))
        })?;
        authenticate(&token, state)
    }
}

/// Anonymous requests yield `None`; a present but invalid token is still
/// rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match token_from_headers(&parts.headers) {
            Some(token) => authenticate(&token, state).map(Some),
            None => Ok(None),
        }
    }
}
