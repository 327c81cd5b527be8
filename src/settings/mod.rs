pub mod dto;
pub mod handlers;
pub mod repo;

use axum::Router;
use uuid::Uuid;

use crate::ai::AiPreferences;
use crate::state::AppState;
use repo::AiSettings;

pub fn router() -> Router<AppState> {
    handlers::routes()
}

/// Per-request preference snapshot. Users without a settings row get the
/// process defaults.
pub async fn load_preferences(state: &AppState, user_id: Uuid) -> anyhow::Result<AiPreferences> {
    let settings = AiSettings::find(&state.db, user_id).await?;
    Ok(AiPreferences::resolve(settings.as_ref(), &state.config.ai))
}
