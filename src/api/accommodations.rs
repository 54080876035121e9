//! Accommodation API endpoints
//!
//! Public:
//! - GET /api/v1/accommodations - Newest first; `latitude` + `longitude` narrow to nearby listings
//! - GET /api/v1/accommodations/verified - Verified listings
//! - GET /api/v1/accommodations/{id} - Detail with images
//! - GET /api/v1/accommodations/{id}/comments - Top-level comments
//!
//! Authenticated:
//! - POST /api/v1/accommodations - Create (hosts; multipart with at least three `image` files)
//! - GET /api/v1/accommodations/mine - Own listings
//! - GET /api/v1/accommodations/unverified - Listings awaiting verification
//! - POST /api/v1/accommodations/{id}/verify - Verify (admin)
//! - PUT /api/v1/accommodations/{id}/rented - Mark rented or available (owner)
//! - DELETE /api/v1/accommodations/{id} - Delete (owner or admin)
//! - POST /api/v1/accommodations/{id}/comments - Comment

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, FormData, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::posts::CommentRequest;
use crate::api::responses::PageResponse;
use crate::models::{
    Accommodation, Comment, CommentView, ContentKind, Coordinates, CreateAccommodationInput,
    ListParams,
};

/// Listing query with an optional search origin
#[derive(Debug, Deserialize)]
pub struct ListAccommodationsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ListAccommodationsQuery {
    /// Both coordinates, or no proximity filter at all
    fn origin(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RentedRequest {
    pub is_rented: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accommodations))
        .route("/verified", get(list_verified))
        .route("/{id}", get(get_accommodation))
        .route("/{id}/comments", get(list_comments))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_accommodation))
        .route("/mine", get(list_own))
        .route("/unverified", get(list_unverified))
        .route("/{id}", axum::routing::delete(delete_accommodation))
        .route("/{id}/verify", post(verify_accommodation))
        .route("/{id}/rented", put(set_rented))
        .route("/{id}/comments", post(create_comment))
}

/// POST /api/v1/accommodations
async fn create_accommodation(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let input = CreateAccommodationInput {
        address: form.required("address")?,
        district: form.text("district").unwrap_or_default(),
        city: form.text("city").unwrap_or_default(),
        number_of_people: form.parse("number_of_people")?.unwrap_or(1),
        rent_cost: form.parse("rent_cost")?.unwrap_or(0),
        description: form.text("description"),
        latitude: form.parse("latitude")?,
        longitude: form.parse("longitude")?,
    };
    let images = form.take_files("image");

    let accommodation = state
        .accommodation_service
        .create(&user, input, images)
        .await?;
    Ok((StatusCode::CREATED, Json(accommodation)))
}

/// GET /api/v1/accommodations
async fn list_accommodations(
    State(state): State<AppState>,
    Query(query): Query<ListAccommodationsQuery>,
) -> Result<Json<PageResponse<Accommodation>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let page = state
        .accommodation_service
        .list(query.origin(), &params)
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/accommodations/verified
async fn list_verified(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Accommodation>>, ApiError> {
    let page = state
        .accommodation_service
        .list_by_verification(true, &query.params())
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/accommodations/unverified
async fn list_unverified(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Accommodation>>, ApiError> {
    let page = state
        .accommodation_service
        .list_by_verification(false, &query.params())
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/accommodations/mine
async fn list_own(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Accommodation>>, ApiError> {
    let page = state
        .accommodation_service
        .list_own(&user, &query.params())
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/accommodations/{id}
async fn get_accommodation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Accommodation>, ApiError> {
    Ok(Json(state.accommodation_service.get(id).await?))
}

/// POST /api/v1/accommodations/{id}/verify
async fn verify_accommodation(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Accommodation>, ApiError> {
    Ok(Json(state.accommodation_service.verify(&user, id).await?))
}

/// PUT /api/v1/accommodations/{id}/rented
async fn set_rented(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RentedRequest>,
) -> Result<Json<Accommodation>, ApiError> {
    let accommodation = state
        .accommodation_service
        .set_rented(&user, id, body.is_rented)
        .await?;
    Ok(Json(accommodation))
}

/// DELETE /api/v1/accommodations/{id}
async fn delete_accommodation(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.accommodation_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/accommodations/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state
        .comment_service
        .comment(&user, ContentKind::Accommodation, id, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/accommodations/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let comments = state
        .comment_service
        .top_level(ContentKind::Accommodation, id)
        .await?;
    Ok(Json(comments))
}
