use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::repo::Routine;
use crate::ai::advisor::{generate_smart_routine, SmartRoutine};
use crate::ai::{AiPreferences, ModelClient};
use crate::audit::{log_interaction, AiInteraction, InteractionKind};
use crate::timefmt::format_hhmm;

const DEFAULT_NOTE: &str = "Routine optimised by AI.";

#[derive(Debug, Clone, PartialEq)]
pub struct SmartOutcome {
    pub applied: bool,
    pub note: Option<String>,
}

pub fn wants_smart_routine(routine: &Routine, prefs: &AiPreferences) -> bool {
    let has_goals = prefs
        .profile
        .goals
        .as_deref()
        .is_some_and(|g| !g.trim().is_empty());
    prefs.smart_routine_enabled && (routine.targets().any_set() || has_goals)
}

pub fn smart_routine_payload(routine: &Routine, prefs: &AiPreferences) -> Value {
    json!({
        "routine": {
            "breakfast_time": format_hhmm(routine.breakfast_time),
            "lunch_time": format_hhmm(routine.lunch_time),
            "dinner_time": format_hhmm(routine.dinner_time),
            "day_end_time": routine.day_end_time.map(format_hhmm),
        },
        "targets": {
            "calorie_target": routine.calorie_target,
            "protein_target": routine.protein_target,
            "carbs_target": routine.carbs_target,
            "fats_target": routine.fats_target,
        },
        "profile": prefs.profile,
    })
}

/// Overwrites the routine with every parsed time and positive target.
/// Returns whether anything changed.
pub fn apply_smart_routine(routine: &mut Routine, s: &SmartRoutine) -> bool {
    let mut applied = false;
    let times = [
        (&mut routine.breakfast_time, s.breakfast),
        (&mut routine.lunch_time, s.lunch),
        (&mut routine.dinner_time, s.dinner),
    ];
    for (slot, proposed) in times {
        if let Some(t) = proposed {
            *slot = t;
            applied = true;
        }
    }
    if let Some(t) = s.day_end {
        routine.day_end_time = Some(t);
        applied = true;
    }

    let targets = [
        (&mut routine.calorie_target, s.targets.calories),
        (&mut routine.protein_target, s.targets.proteins),
        (&mut routine.carbs_target, s.targets.carbs),
        (&mut routine.fats_target, s.targets.fats),
    ];
    for (slot, proposed) in targets {
        if let Some(v) = proposed.filter(|v| *v > 0.0) {
            *slot = Some(v);
            applied = true;
        }
    }
    applied
}

/// Runs the smart-routine suggestion over an already updated routine. A model
/// failure leaves the routine as the user set it.
pub async fn optimise_routine(
    db: &sqlx::PgPool,
    client: &dyn ModelClient,
    user_id: Uuid,
    routine: &mut Routine,
    prefs: &AiPreferences,
) -> SmartOutcome {
    let payload = smart_routine_payload(routine, prefs);
    match generate_smart_routine(client, &payload, prefs).await {
        Ok(suggestion) => {
            let applied = apply_smart_routine(routine, &suggestion);
            let note = suggestion.note.clone().unwrap_or_else(|| DEFAULT_NOTE.into());
            info!(%user_id, applied, "smart routine suggestion received");
            log_interaction(
                db,
                user_id,
                AiInteraction::new(InteractionKind::SmartRoutine, &prefs.text_model)
                    .input(payload)
                    .output(Value::String(suggestion.raw))
                    .meta(json!({ "note": note, "applied": applied })),
            )
            .await;
            SmartOutcome {
                applied,
                note: Some(note),
            }
        }
        Err(e) => {
            warn!(error = %e, %user_id, "smart routine unavailable, keeping user values");
            SmartOutcome {
                applied: false,
                note: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::scripted::ScriptedClient;
    use crate::config::AiDefaults;
    use crate::state::AppState;
    use std::sync::Arc;
    use time::macros::time;

    fn prefs(smart: bool, goals: Option<&str>) -> AiPreferences {
        let mut p = AiPreferences::defaults(&AiDefaults::default());
        p.smart_routine_enabled = smart;
        p.profile.goals = goals.map(str::to_string);
        p
    }

    #[test]
    fn smart_routine_needs_the_toggle_and_targets_or_goals() {
        let mut routine = Routine::with_defaults(Uuid::nil());
        assert!(!wants_smart_routine(&routine, &prefs(true, None)));
        assert!(wants_smart_routine(&routine, &prefs(true, Some("lose weight"))));
        routine.calorie_target = Some(1900.0);
        assert!(wants_smart_routine(&routine, &prefs(true, None)));
        assert!(!wants_smart_routine(&routine, &prefs(false, Some("lose weight"))));
    }

    #[test]
    fn only_parsed_times_and_positive_targets_are_applied() {
        let mut routine = Routine::with_defaults(Uuid::nil());
        routine.protein_target = Some(120.0);
        let suggestion = SmartRoutine {
            lunch: Some(time!(12:45)),
            targets: crate::nutrition::MacroTargets {
                calories: Some(2100.0),
                proteins: Some(0.0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(apply_smart_routine(&mut routine, &suggestion));
        assert_eq!(routine.lunch_time, time!(12:45));
        assert_eq!(routine.breakfast_time, time!(08:00));
        assert_eq!(routine.calorie_target, Some(2100.0));
        assert_eq!(routine.protein_target, Some(120.0));

        let mut untouched = Routine::with_defaults(Uuid::nil());
        assert!(!apply_smart_routine(&mut untouched, &SmartRoutine::default()));
        assert_eq!(untouched, Routine::with_defaults(Uuid::nil()));
    }

    #[test]
    fn payload_renders_times_as_hhmm() {
        let routine = Routine::with_defaults(Uuid::nil());
        let v = smart_routine_payload(&routine, &prefs(true, Some("cut")));
        assert_eq!(v["routine"]["dinner_time"], "20:00");
        assert_eq!(v["routine"]["day_end_time"], Value::Null);
        assert_eq!(v["profile"]["goals"], "cut");
    }

    #[tokio::test]
    async fn model_failure_keeps_user_values() {
        let client = Arc::new(ScriptedClient::default());
        let state = AppState::fake(client.clone());
        let mut routine = Routine::with_defaults(Uuid::nil());
        routine.calorie_target = Some(1800.0);
        let before = routine.clone();

        let outcome =
            optimise_routine(&state.db, client.as_ref(), Uuid::nil(), &mut routine, &prefs(true, None)).await;

        assert_eq!(outcome, SmartOutcome { applied: false, note: None });
        assert_eq!(routine, before);
    }

    #[tokio::test]
    async fn suggestion_without_note_gets_default_note() {
        let client = Arc::new(ScriptedClient::replying(&[r#"{"dinner_time": "19:30"}"#]));
        let state = AppState::fake(client.clone());
        let mut routine = Routine::with_defaults(Uuid::nil());

        let outcome =
            optimise_routine(&state.db, client.as_ref(), Uuid::nil(), &mut routine, &prefs(true, Some("x"))).await;

        assert!(outcome.applied);
        assert_eq!(outcome.note.as_deref(), Some(DEFAULT_NOTE));
        assert_eq!(routine.dinner_time, time!(19:30));
    }
}
