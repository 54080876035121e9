//! User and follow-graph API endpoints
//!
//! - GET /api/v1/users - List users
//! - GET /api/v1/users/{username} - One user
//! - DELETE /api/v1/users/me - Delete own account
//! - POST /api/v1/users/follow?username= - Follow or unfollow
//! - GET /api/v1/users/me/followers - Who follows me
//! - GET /api/v1/users/me/following - Who I follow

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{PageResponse, UserResponse};
use crate::models::FollowToggle;

#[derive(Debug, Deserialize)]
pub struct FollowQuery {
    pub username: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", delete(delete_account))
        .route("/me/followers", get(followers))
        .route("/me/following", get(following))
        .route("/follow", post(toggle_follow))
        .route("/{username}", get(get_user))
}

/// GET /api/v1/users
async fn list_users(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<UserResponse>>, ApiError> {
    let page = state.user_service.list(&query.params()).await?;
    Ok(Json(page.map(UserResponse::from).into()))
}

/// GET /api/v1/users/{username}
async fn get_user(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.get_by_username(&username).await?;
    Ok(Json(user.into()))
}

/// DELETE /api/v1/users/me
async fn delete_account(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.delete_account(&user).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

/// POST /api/v1/users/follow?username=
///
/// 201 with the new edge when following, 204 when unfollowing.
async fn toggle_follow(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<FollowQuery>,
) -> Result<Response, ApiError> {
    let response = match state.follow_service.toggle(&user, &query.username).await? {
        FollowToggle::Created(edge) => (StatusCode::CREATED, Json(edge)).into_response(),
        FollowToggle::Removed => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}

async fn users_by_id(state: &AppState, ids: &[i64]) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.user_service.get_many(ids).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/v1/users/me/followers
async fn followers(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let ids = state.follow_service.followers(&user).await?;
    users_by_id(&state, &ids).await
}

/// GET /api/v1/users/me/following
async fn following(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let ids = state.follow_service.following(&user).await?;
    users_by_id(&state, &ids).await
}
