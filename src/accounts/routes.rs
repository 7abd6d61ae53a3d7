//! REST endpoints for registration, sessions and profiles.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use super::model::{LoginForm, RegisterForm};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiJson;

/// POST /api/register
async fn register(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<RegisterForm>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.accounts.register(form).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.accounts.login(form).await?))
}

/// POST /api/logout
async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode, ApiError> {
    state.accounts.logout(&auth.token_hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/me
async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.accounts.current_user(auth.user).await?))
}

/// GET /api/profile
async fn own_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.accounts.get_profile(&auth.user).await?))
}

/// PUT /api/profile
///
/// Body is a company or worker profile form, depending on the caller's role.
async fn update_own_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = auth.user.id;
    Ok(Json(
        state.accounts.update_profile(&auth.user, owner, body).await?,
    ))
}

/// GET /api/users/{id}/profile
async fn show_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.accounts.show_profile(id).await?))
}

/// PUT /api/users/{id}/profile
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.accounts.update_profile(&auth.user, id, body).await?))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/profile", get(own_profile).put(update_own_profile))
        .route("/api/users/{id}/profile", get(show_profile).put(update_profile))
}
