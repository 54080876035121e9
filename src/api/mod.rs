//! API layer - HTTP handlers and routing
//!
//! Everything lives under `/api/v1`:
//! - Auth (register, login, logout, me, profile)
//! - Users and the follow graph
//! - Posts and accommodations
//! - Comment threads
//! - Notifications
//! - Stats (administrators)
//!
//! Uploaded images are served from the configured public prefix.

pub mod accommodations;
pub mod auth;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod responses;
pub mod stats;
pub mod users;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::router())
        .nest("/posts", posts::protected_router())
        .nest("/accommodations", accommodations::protected_router())
        .nest("/comments", comments::protected_router())
        .nest("/notifications", notifications::router())
        .nest("/stats", stats::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/posts", posts::public_router())
        .nest("/accommodations", accommodations::public_router())
        .nest("/comments", comments::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> Result<Router> {
    let origin = config
        .server
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", config.server.cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let uploads_prefix = format!("/{}", config.upload.public_prefix.trim_matches('/'));

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service(&uploads_prefix, ServeDir::new(&config.upload.path))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
