use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{error, instrument};

use super::dto::{ChatRequest, ChatResponse};
use super::services::{self, ChatError};
use crate::{ai::ai_failure, auth::AuthUser, settings::load_preferences, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

#[instrument(skip(state, body))]
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    body.validate()
        .map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;
    let prefs = load_preferences(&state, user_id).await.map_err(internal)?;

    let reply = services::reply(&state, user_id, &body.message, body.recent_history(), &prefs)
        .await
        .map_err(|e| match e {
            ChatError::Model(e) => ai_failure(e),
            ChatError::Storage(e) => internal(e),
        })?;
    Ok(Json(ChatResponse { reply }))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "chat request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
