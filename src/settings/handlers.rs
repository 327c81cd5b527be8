use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::dto::{AiSettingsUpdate, ModelsQuery, ModelsResponse};
use super::repo::AiSettings;
use crate::{auth::AuthUser, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route("/settings/models", get(list_models))
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AiSettings>, (StatusCode, String)> {
    let settings = AiSettings::get_or_create(&state.db, user_id, &state.config.ai)
        .await
        .map_err(internal)?;
    Ok(Json(settings))
}

#[instrument(skip(state, body))]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AiSettingsUpdate>,
) -> Result<Json<AiSettings>, (StatusCode, String)> {
    body.validate()
        .map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;

    let mut settings = AiSettings::get_or_create(&state.db, user_id, &state.config.ai)
        .await
        .map_err(internal)?;
    body.apply(&mut settings);

    let saved = settings.save(&state.db).await.map_err(internal)?;
    Ok(Json(saved))
}

/// Installed models at the override URL, else the user's, else the default.
#[instrument(skip(state))]
pub async fn list_models(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ModelsQuery>,
) -> Result<Json<ModelsResponse>, (StatusCode, String)> {
    let settings = AiSettings::get_or_create(&state.db, user_id, &state.config.ai)
        .await
        .map_err(internal)?;

    let base_url = [q.base_url.as_deref(), settings.ollama_base_url.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(&state.config.ai.base_url)
        .trim_end_matches('/')
        .to_string();

    let models = state
        .model
        .list_models(&base_url, std::time::Duration::from_secs(20))
        .await
        .map_err(|e| {
            warn!(error = %e, %base_url, "model listing failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Could not read models from Ollama. Check the URL and that the service is reachable."
                    .to_string(),
            )
        })?;

    if models.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            "No models found at the given Ollama URL.".into(),
        ));
    }

    let vision_default = non_empty_or(&settings.vision_model, &state.config.ai.vision_model);
    let text_default = non_empty_or(&settings.text_model, &state.config.ai.text_model);
    Ok(Json(ModelsResponse::group(base_url, models, vision_default, text_default)))
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "settings request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
