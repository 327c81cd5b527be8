use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use super::dto::ChatTurn;
use crate::{
    ai::{advisor::generate_chat_response, AiError, AiPreferences},
    audit::{log_interaction, AiInteraction, InteractionKind},
    daily::repo::find_summary,
    meals::repo::totals_for_day,
    nutrition::{MacroTargets, Macros, NutritionProfile},
    routine::repo::Routine,
    state::AppState,
};

pub struct ChatContext<'a> {
    pub message: &'a str,
    pub history: &'a [ChatTurn],
    pub totals: Macros,
    pub targets: MacroTargets,
    pub advice: Option<String>,
    pub profile: &'a NutritionProfile,
}

impl ChatContext<'_> {
    pub fn payload(&self) -> Value {
        json!({
            "message": self.message.trim(),
            "history": self.history,
            "totals": self.totals.rounded(),
            "targets": self.targets.rounded(),
            "daily_summary": self.advice,
            "user_profile": self.profile,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
    #[error(transparent)]
    Model(#[from] AiError),
}

/// Answers with today's intake, targets and cached advice in context.
#[instrument(skip(state, message, history, prefs))]
pub async fn reply(
    state: &AppState,
    user_id: Uuid,
    message: &str,
    history: &[ChatTurn],
    prefs: &AiPreferences,
) -> Result<String, ChatError> {
    let today = state.config.local_now().date();
    let (totals, _) = totals_for_day(&state.db, user_id, today).await?;
    let targets = Routine::find(&state.db, user_id)
        .await?
        .map(|r| r.targets())
        .unwrap_or_default();
    let advice = find_summary(&state.db, user_id, today)
        .await?
        .and_then(|row| row.advice);

    let payload = ChatContext {
        message,
        history,
        totals,
        targets,
        advice,
        profile: &prefs.profile,
    }
    .payload();

    let reply = generate_chat_response(state.model.as_ref(), &payload, prefs).await?;

    log_interaction(
        &state.db,
        user_id,
        AiInteraction::new(InteractionKind::Chat, &prefs.text_model)
            .input(payload)
            .output(json!({ "reply": reply })),
    )
    .await;

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_holds_rounded_totals_and_profile() {
        let profile = NutritionProfile {
            weight_kg: Some(72.0),
            goals: Some("recomp".into()),
            ..Default::default()
        };
        let history = vec![ChatTurn { role: "assistant".into(), content: "Hello!".into() }];
        let ctx = ChatContext {
            message: "  what now? ",
            history: &history,
            totals: Macros { calories: 1234.567, proteins: 80.04, carbs: 150.0, fats: 40.0 },
            targets: MacroTargets { proteins: Some(140.0), ..Default::default() },
            advice: None,
            profile: &profile,
        };
        let payload = ctx.payload();

        assert_eq!(payload["message"], "what now?");
        assert_eq!(payload["history"][0]["role"], "assistant");
        assert_eq!(payload["targets"]["proteins"], 140.0);
        assert_eq!(payload["user_profile"]["goals"], "recomp");
        assert!(payload["daily_summary"].is_null());
    }
}
