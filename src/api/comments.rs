//! Comment thread API endpoints
//!
//! `kind` is `post` or `accommodation`; `id` is a comment id of that kind.
//! - POST /api/v1/comments/{kind}/{id} - Reply
//! - GET /api/v1/comments/{kind}/{id} - Direct replies
//! - PUT /api/v1/comments/{kind}/{id} - Edit (author only)
//! - DELETE /api/v1/comments/{kind}/{id} - Delete with replies

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::posts::CommentRequest;
use crate::models::{Comment, CommentView, ContentKind};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/{kind}/{id}", get(list_replies))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route(
        "/{kind}/{id}",
        axum::routing::post(reply)
            .put(edit_comment)
            .delete(delete_comment),
    )
}

fn parse_kind(raw: &str) -> Result<ContentKind, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Unknown comment kind: {}", raw)))
}

/// POST /api/v1/comments/{kind}/{id}
async fn reply(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let kind = parse_kind(&kind)?;
    let comment = state.comment_service.reply(&user, kind, id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/comments/{kind}/{id}
async fn list_replies(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.comment_service.replies(kind, id).await?))
}

/// PUT /api/v1/comments/{kind}/{id}
async fn edit_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.comment_service.edit(&user, kind, id, &body.text).await?))
}

/// DELETE /api/v1/comments/{kind}/{id}
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    state.comment_service.delete(&user, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
