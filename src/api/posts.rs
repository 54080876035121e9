//! Post API endpoints
//!
//! Public:
//! - GET /api/v1/posts - Newest first
//! - GET /api/v1/posts/approved - Approved posts
//! - GET /api/v1/posts/{id} - Detail with images
//! - GET /api/v1/posts/{id}/comments - Top-level comments
//!
//! Authenticated:
//! - POST /api/v1/posts - Create (multipart: content, caption, description, image*)
//! - GET /api/v1/posts/mine - Own posts
//! - GET /api/v1/posts/pending - Posts awaiting approval
//! - POST /api/v1/posts/{id}/approve - Approve (admin)
//! - DELETE /api/v1/posts/{id} - Delete (owner or admin)
//! - POST /api/v1/posts/{id}/comments - Comment

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{FormData, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PageResponse;
use crate::models::{Comment, CommentView, ContentKind, CreatePostInput, Post};

/// Request body for a new comment
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/approved", get(list_approved))
        .route("/{id}", get(get_post))
        .route("/{id}/comments", get(list_comments))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/mine", get(list_own))
        .route("/pending", get(list_pending))
        .route("/{id}", axum::routing::delete(delete_post))
        .route("/{id}/approve", post(approve_post))
        .route("/{id}/comments", post(create_comment))
}

/// POST /api/v1/posts
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let input = CreatePostInput {
        content: form.required("content")?,
        caption: form.text("caption"),
        description: form.text("description"),
    };
    let images = form.take_files("image");

    let post = state.post_service.create(&user, input, images).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/v1/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Post>>, ApiError> {
    Ok(Json(state.post_service.list(&query.params()).await?.into()))
}

/// GET /api/v1/posts/approved
async fn list_approved(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Post>>, ApiError> {
    let page = state.post_service.list_by_approval(true, &query.params()).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/posts/pending
async fn list_pending(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Post>>, ApiError> {
    let page = state.post_service.list_by_approval(false, &query.params()).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/posts/mine
async fn list_own(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Post>>, ApiError> {
    Ok(Json(state.post_service.list_own(&user, &query.params()).await?.into()))
}

/// GET /api/v1/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get(id).await?))
}

/// POST /api/v1/posts/{id}/approve
async fn approve_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.approve(&user, id).await?))
}

/// DELETE /api/v1/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/posts/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state
        .comment_service
        .comment(&user, ContentKind::Post, id, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/posts/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    Ok(Json(state.comment_service.top_level(ContentKind::Post, id).await?))
}
