use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::{WaterCreate, WaterSummary};
use super::repo::{self, WaterIntake};
use crate::{
    auth::AuthUser, meals::dto::DayQuery, nutrition::needs::water_target_ml,
    settings::load_preferences, state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/water", get(water_summary).post(add_water))
}

#[instrument(skip(state))]
pub async fn add_water(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<WaterCreate>,
) -> Result<Json<WaterIntake>, (StatusCode, String)> {
    body.validate()
        .map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;
    let consumed_at = body.consumed_at.unwrap_or_else(|| state.config.local_now());
    let entry = repo::insert(&state.db, user_id, body.amount_ml, consumed_at)
        .await
        .map_err(internal)?;
    Ok(Json(entry))
}

#[instrument(skip(state))]
pub async fn water_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<WaterSummary>, (StatusCode, String)> {
    let day = q.day.unwrap_or_else(|| state.config.local_now().date());
    let entries = repo::list_for_day(&state.db, user_id, day)
        .await
        .map_err(internal)?;
    let prefs = load_preferences(&state, user_id).await.map_err(internal)?;
    Ok(Json(WaterSummary::new(day, water_target_ml(&prefs.profile), entries)))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "water request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
