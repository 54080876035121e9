//! Notification API endpoints
//!
//! - GET /api/v1/notifications - Own notifications, newest first
//! - GET /api/v1/notifications/unread - Unread count
//! - POST /api/v1/notifications/{id}/read - Mark one as read

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::Notification;

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub unread: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread", get(unread_count))
        .route("/{id}/read", post(mark_read))
}

async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.notification_service.list_for(&user).await?))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadResponse>, ApiError> {
    let unread = state.notification_service.unread_count(&user).await?;
    Ok(Json(UnreadResponse { unread }))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(state.notification_service.mark_read(&user, id).await?))
}
