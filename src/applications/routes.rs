//! REST endpoints for the application workflow.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use super::model::{ApplicationFilter, ApplicationForm};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

/// POST /api/jobs/{id}/applications
async fn apply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_post_id): Path<Uuid>,
    ApiJson(form): ApiJson<ApplicationForm>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.applications.apply(&auth.user, job_post_id, form).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/applications?status=&job_post_id=
async fn list_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(filter): ApiQuery<ApplicationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.applications.list(&auth.user, &filter).await?))
}

/// GET /api/applications/{id}
async fn show_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.applications.show(&auth.user, id).await?))
}

/// POST /api/applications/{id}/accept
async fn accept_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.applications.accept(&auth.user, id).await?))
}

/// POST /api/applications/{id}/reject
async fn reject_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.applications.reject(&auth.user, id).await?))
}

/// DELETE /api/applications/{id}
async fn withdraw_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.applications.withdraw(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs/{id}/applications", post(apply))
        .route("/api/applications", get(list_applications))
        .route(
            "/api/applications/{id}",
            get(show_application).delete(withdraw_application),
        )
        .route("/api/applications/{id}/accept", post(accept_application))
        .route("/api/applications/{id}/reject", post(reject_application))
}
