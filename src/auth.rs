//! Bearer-token authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;

use crate::accounts::model::User;
use crate::accounts::password::hash_token;
use crate::app::AppState;
use crate::error::ApiError;

/// The authenticated user of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// Hash of the presented token, used by logout.
    pub token_hash: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let token_hash = hash_token(token);

        let user = state
            .db
            .get_session_user(&token_hash, Utc::now())
            .await?
            .ok_or_else(|| ApiError::Unauthorized("invalid or expired session".into()))?;

        Ok(AuthUser { user, token_hash })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".into()))
}
