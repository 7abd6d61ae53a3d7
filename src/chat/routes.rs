//! REST endpoints for chat. Clients poll `GET .../messages?after=` every
//! `poll_interval_secs`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use super::model::{MessageForm, PollQuery};
use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

/// GET /api/chat/rooms
async fn list_rooms(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.chat.list_rooms(&auth.user).await?))
}

/// GET /api/chat/rooms/{id}
async fn show_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.chat.room(&auth.user, id).await?))
}

/// GET /api/chat/rooms/{id}/messages?after=
async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiQuery(query): ApiQuery<PollQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state.chat.messages(&auth.user, id, query.after).await?,
    ))
}

/// POST /api/chat/rooms/{id}/messages
async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(form): ApiJson<MessageForm>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.chat.send(&auth.user, id, form).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chat/unread-count
async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.chat.unread_count(&auth.user).await?;
    Ok(Json(serde_json::json!({ "unread_count": count })))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/rooms", get(list_rooms))
        .route("/api/chat/rooms/{id}", get(show_room))
        .route(
            "/api/chat/rooms/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chat/unread-count", get(unread_count))
}
