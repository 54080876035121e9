//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Register (multipart, avatar required for hosts and tenants)
//! - POST /api/v1/auth/login - Log in, returning a session token and cookie
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update own profile (multipart, optional new avatar)

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::FormData;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, SessionToken};
use crate::api::responses::{AuthResponse, UserResponse};
use crate::models::{CreateUserInput, Session, UpdateProfileInput, User, UserRole};

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

fn session_cookie(session: &Session, days: i64) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id,
        days.max(1) * 24 * 60 * 60
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)?,
    );
    Ok(headers)
}

fn authenticated(state: &AppState, user: User, session: Session) -> Result<impl IntoResponse, ApiError> {
    let headers = session_cookie(&session, state.session_days)?;
    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/register - User registration
///
/// Multipart fields: username, email, password, first_name, last_name,
/// phone, role and an `avatar` file.
async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = FormData::read(multipart).await?;

    let role = match form.text("role") {
        Some(raw) => raw
            .parse::<UserRole>()
            .map_err(|_| ApiError::validation_error(format!("Unknown role: {}", raw)))?,
        None => UserRole::default(),
    };
    let password = form.required("password")?;
    let input = CreateUserInput {
        username: form.required("username")?,
        email: form.text("email").unwrap_or_default(),
        password: password.clone(),
        first_name: form.text("first_name").unwrap_or_default(),
        last_name: form.text("last_name").unwrap_or_default(),
        phone: form.text("phone"),
        role,
    };
    let avatar = form.take_file("avatar");

    let user = state.user_service.register(input, avatar).await?;
    let (user, session) = state.user_service.login(&user.username, &password).await?;

    Ok((StatusCode::CREATED, authenticated(&state, user, session)?))
}

/// POST /api/v1/auth/login - User login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = state.user_service.login(&body.username, &body.password).await?;
    authenticated(&state, user, session)
}

/// POST /api/v1/auth/logout - User logout
async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me - Get current user
async fn get_current_user(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}

/// PUT /api/v1/auth/profile - Update current user's profile
async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let input = UpdateProfileInput {
        first_name: form.text("first_name"),
        last_name: form.text("last_name"),
        email: form.text("email"),
        phone: form.raw_text("phone"),
    };
    let avatar = form.take_file("avatar");

    let updated = state.user_service.update_profile(&user, input, avatar).await?;
    Ok(Json(updated.into()))
}
