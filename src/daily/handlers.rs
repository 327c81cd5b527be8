use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::{DailyNeedsResponse, DailySummaryResponse, SummaryQuery, TimelineResponse};
use super::services::{build_daily_needs, build_daily_summary, build_timeline};
use crate::{auth::AuthUser, meals::dto::DayQuery, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary/day", get(day_summary))
        .route("/summary/needs", get(daily_needs))
        .route("/summary/timeline", get(timeline))
}

#[instrument(skip(state))]
pub async fn day_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<DailySummaryResponse>, (StatusCode, String)> {
    let day = q.day.unwrap_or_else(|| state.config.local_now().date());
    let summary = build_daily_summary(&state, user_id, day, q.wants_refresh())
        .await
        .map_err(internal)?;
    Ok(Json(summary))
}

#[instrument(skip(state))]
pub async fn daily_needs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<DailyNeedsResponse>, (StatusCode, String)> {
    let day = q.day.unwrap_or_else(|| state.config.local_now().date());
    let needs = build_daily_needs(&state, user_id, day)
        .await
        .map_err(internal)?;
    Ok(Json(needs))
}

#[instrument(skip(state))]
pub async fn timeline(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<TimelineResponse>, (StatusCode, String)> {
    let day = q.day.unwrap_or_else(|| state.config.local_now().date());
    let timeline = build_timeline(&state, user_id, day)
        .await
        .map_err(internal)?;
    Ok(Json(timeline))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "summary request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
