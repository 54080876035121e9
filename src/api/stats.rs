//! Reporting API (administrators)
//!
//! - GET /api/v1/stats/{subject}?period=month|quarter|year
//!
//! `subject` is `logins`, `posts` or `accommodations`.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ChartSeries, Period, ReportSubject};

fn default_period() -> Period {
    Period::Month
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default = "default_period")]
    pub period: Period,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{subject}", get(report))
}

async fn report(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(subject): Path<ReportSubject>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ChartSeries>, ApiError> {
    let series = state
        .stats_service
        .report(&user, subject, query.period)
        .await?;
    Ok(Json(series))
}
