//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - Authentication (session token validation)
//! - The JSON error envelope and its mapping from service errors

use anyhow::Result;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxAccommodationRepository, SqlxCommentRepository, SqlxFollowRepository,
    SqlxNotificationRepository, SqlxPostRepository, SqlxSessionRepository, SqlxStatsRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    build_mailer, AccommodationService, AccommodationServiceError, CachedDistanceProvider,
    CommentService, CommentServiceError, DistanceProvider, FollowService, FollowServiceError,
    LocalStorage, Mailer, NotificationService, NotificationServiceError, ObjectStorage,
    PostService, PostServiceError, ProximitySearch, RoutesClient, StatsService,
    StatsServiceError, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub follow_service: Arc<FollowService>,
    pub post_service: Arc<PostService>,
    pub accommodation_service: Arc<AccommodationService>,
    pub comment_service: Arc<CommentService>,
    pub notification_service: Arc<NotificationService>,
    pub stats_service: Arc<StatsService>,
    pub session_days: i64,
}

impl AppState {
    /// Wire every service with the production storage, mailer and router
    pub fn from_config(pool: DynDatabasePool, config: &Config) -> Result<Self> {
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(config.upload.clone()));
        let mailer = build_mailer(&config.email)?;
        let routes: Arc<dyn DistanceProvider> = Arc::new(RoutesClient::new(&config.routing)?);
        let distances: Arc<dyn DistanceProvider> =
            Arc::new(CachedDistanceProvider::from_config(routes, &config.routing));
        Ok(Self::with_parts(pool, config, storage, mailer, distances))
    }

    /// Wire every service around the given external dependencies
    pub fn with_parts(
        pool: DynDatabasePool,
        config: &Config,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
        distances: Arc<dyn DistanceProvider>,
    ) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let follow_repo = SqlxFollowRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let accommodation_repo = SqlxAccommodationRepository::boxed(pool.clone());

        let notification_service = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            follow_repo.clone(),
            user_repo.clone(),
            mailer,
        ));

        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            storage.clone(),
            config.server.session_days,
        ));
        let follow_service = Arc::new(FollowService::new(
            follow_repo,
            user_repo,
            notification_service.clone(),
            config.social.allow_self_follow,
        ));
        let post_service = Arc::new(PostService::new(
            post_repo.clone(),
            storage.clone(),
            notification_service.clone(),
        ));
        let accommodation_service = Arc::new(AccommodationService::new(
            accommodation_repo.clone(),
            storage,
            notification_service.clone(),
            ProximitySearch::new(distances, &config.routing),
            config.social.min_accommodation_images,
        ));
        let comment_service = Arc::new(CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            post_repo,
            accommodation_repo,
            notification_service.clone(),
            config.social.owner_only_comment_delete,
        ));
        let stats_service = Arc::new(StatsService::new(SqlxStatsRepository::boxed(pool.clone())));

        Self {
            pool,
            user_service,
            follow_service,
            post_service,
            accommodation_service,
            comment_service,
            notification_service,
            stats_service,
            session_days: config.server.session_days,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Session token the request was authenticated with
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionToken>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Logs the cause; clients only see a generic message
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Request failed: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

// ============================================================================
// Service error mapping
// ============================================================================

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::SessionExpired | UserServiceError::SessionNotFound => {
                ApiError::unauthorized("Invalid or expired session")
            }
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::Conflict(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<FollowServiceError> for ApiError {
    fn from(e: FollowServiceError) -> Self {
        match e {
            FollowServiceError::NotFound(username) => {
                ApiError::not_found(format!("User '{}' not found", username))
            }
            FollowServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            FollowServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound => ApiError::not_found("Post not found"),
            PostServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<AccommodationServiceError> for ApiError {
    fn from(e: AccommodationServiceError) -> Self {
        match e {
            AccommodationServiceError::NotFound => ApiError::not_found("Accommodation not found"),
            AccommodationServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            AccommodationServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AccommodationServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<NotificationServiceError> for ApiError {
    fn from(e: NotificationServiceError) -> Self {
        match e {
            NotificationServiceError::NotFound => ApiError::not_found("Notification not found"),
            NotificationServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            NotificationServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<StatsServiceError> for ApiError {
    fn from(e: StatsServiceError) -> Self {
        match e {
            StatsServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            StatsServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract session token from the bearer header or the `session` cookie
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = request.headers().get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state.user_service.validate_session(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}
