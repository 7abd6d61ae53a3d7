//! REST endpoints for job posts.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use super::model::{JobFilter, JobPostForm};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

/// GET /api/jobs
///
/// Public listing. Query: `purpose`, `want_you`, `can_do`, `keyword`,
/// `company_id`, `open_only`, `page`, `per_page`.
async fn list_jobs(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<JobFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.jobs.list(&filter).await?))
}

/// POST /api/jobs
async fn create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(form): ApiJson<JobPostForm>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.jobs.create(&auth.user, form).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/jobs/{id}
async fn show_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.jobs.show(id).await?))
}

/// PUT /api/jobs/{id}
async fn update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(form): ApiJson<JobPostForm>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.jobs.update(&auth.user, id, form).await?))
}

/// DELETE /api/jobs/{id}
async fn delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.jobs.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route(
            "/api/jobs/{id}",
            get(show_job).put(update_job).delete(delete_job),
        )
}
