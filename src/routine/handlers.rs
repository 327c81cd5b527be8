use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, instrument};

use super::dto::{RoutineResponse, RoutineUpdate};
use super::repo::Routine;
use super::services::{optimise_routine, wants_smart_routine};
use crate::{auth::AuthUser, settings::load_preferences, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/routine", get(get_routine).put(update_routine))
}

#[instrument(skip(state))]
pub async fn get_routine(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<RoutineResponse>, (StatusCode, String)> {
    let routine = Routine::get_or_create(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(RoutineResponse {
        routine,
        ai_applied: None,
        ai_note: None,
    }))
}

#[instrument(skip(state, body))]
pub async fn update_routine(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<RoutineUpdate>,
) -> Result<Json<RoutineResponse>, (StatusCode, String)> {
    body.validate()
        .map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;

    let mut routine = Routine::get_or_create(&state.db, user_id)
        .await
        .map_err(internal)?;
    body.apply(&mut routine);

    let prefs = load_preferences(&state, user_id).await.map_err(internal)?;
    let (ai_applied, ai_note) = if wants_smart_routine(&routine, &prefs) {
        let outcome =
            optimise_routine(&state.db, state.model.as_ref(), user_id, &mut routine, &prefs).await;
        (outcome.applied, outcome.note)
    } else {
        (false, None)
    };

    let routine = routine.save(&state.db).await.map_err(internal)?;
    Ok(Json(RoutineResponse {
        routine,
        ai_applied: Some(ai_applied),
        ai_note,
    }))
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "routine request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
