//! Day-level read models: the summary with its close-day advice, the daily
//! needs and the meal timeline.

use async_trait::async_trait;
use serde_json::{json, Value};
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::cycle::{closing_boundary, day_status, DayStatus, RoutineSchedule};
use super::dto::{DailyNeedsResponse, DailySummaryResponse, NeedsSource, TimelineResponse};
use super::repo::{find_summary, upsert_summary, DailySummaryRow};
use crate::ai::advisor::{generate_daily_advice, generate_daily_needs, generate_timeline_guidance, AiNeeds};
use crate::ai::{AiPreferences, ModelClient};
use crate::audit::{log_interaction, AiInteraction, InteractionKind};
use crate::meals::repo::totals_for_day;
use crate::nutrition::needs::{estimate_daily_needs, water_target_ml, BASELINE_NOTE};
use crate::nutrition::timeline::{build_phases, fallback_guidance};
use crate::nutrition::{MacroTargets, Macros, NutritionProfile};
use crate::routine::repo::Routine;
use crate::settings::load_preferences;
use crate::state::AppState;
use crate::timefmt::format_ymd;

pub const ADVICE_FALLBACK: &str = "Day closed: try to spread macros better across the main meals \
                                   and add a bit more vegetables and fibre in the coming days.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPlan {
    /// Open day: nothing is persisted and advice is withheld.
    Open,
    /// Closed with advice already stored: frozen totals, no write.
    ServeCached,
    /// Closed and either no advice yet or a refresh was asked for.
    Regenerate,
}

pub fn plan_summary(status: DayStatus, stored: Option<&DailySummaryRow>, refresh: bool) -> SummaryPlan {
    match status {
        DayStatus::Open => SummaryPlan::Open,
        DayStatus::Closed if !refresh && stored.and_then(DailySummaryRow::cached_advice).is_some() => {
            SummaryPlan::ServeCached
        }
        DayStatus::Closed => SummaryPlan::Regenerate,
    }
}

pub fn advice_payload(
    day: Date,
    totals: &Macros,
    targets: &MacroTargets,
    meal_count: usize,
    profile: &NutritionProfile,
) -> Value {
    json!({
        "day": format_ymd(day),
        "totals": totals,
        "targets": targets,
        "meal_count": meal_count,
        "user_profile": profile,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    pub text: String,
    pub ai_used: bool,
}

/// Close-day advice. A model failure yields the fixed fallback sentence so
/// closing a day never fails.
pub async fn close_day_advice(client: &dyn ModelClient, payload: &Value, prefs: &AiPreferences) -> Advice {
    match generate_daily_advice(client, payload, prefs).await {
        Ok(text) => Advice { text, ai_used: true },
        Err(e) => {
            warn!(error = %e, "daily advice unavailable, using fallback");
            Advice {
                text: ADVICE_FALLBACK.to_string(),
                ai_used: false,
            }
        }
    }
}

/// A user without a routine row gets the default schedule and no targets.
async fn schedule_and_targets(state: &AppState, user_id: Uuid) -> anyhow::Result<(RoutineSchedule, MacroTargets)> {
    let routine = Routine::find(&state.db, user_id).await?;
    let schedule = routine.as_ref().map(Routine::schedule).unwrap_or_default();
    let targets = routine.as_ref().map(Routine::targets).unwrap_or_default();
    Ok((schedule, targets))
}

/// Reads and writes the day summary depends on.
#[async_trait]
pub trait DayStore: Send + Sync {
    async fn day_totals(&self, user_id: Uuid, day: Date) -> anyhow::Result<(Macros, usize)>;
    async fn schedule_and_targets(&self, user_id: Uuid) -> anyhow::Result<(RoutineSchedule, MacroTargets)>;
    async fn find_summary(&self, user_id: Uuid, day: Date) -> anyhow::Result<Option<DailySummaryRow>>;
    async fn upsert_summary(&self, row: &DailySummaryRow) -> anyhow::Result<()>;
    async fn preferences(&self, user_id: Uuid) -> anyhow::Result<AiPreferences>;
    async fn log_interaction(&self, user_id: Uuid, entry: AiInteraction);
}

#[async_trait]
impl DayStore for AppState {
    async fn day_totals(&self, user_id: Uuid, day: Date) -> anyhow::Result<(Macros, usize)> {
        totals_for_day(&self.db, user_id, day).await
    }

    async fn schedule_and_targets(&self, user_id: Uuid) -> anyhow::Result<(RoutineSchedule, MacroTargets)> {
        schedule_and_targets(self, user_id).await
    }

    async fn find_summary(&self, user_id: Uuid, day: Date) -> anyhow::Result<Option<DailySummaryRow>> {
        find_summary(&self.db, user_id, day).await
    }

    async fn upsert_summary(&self, row: &DailySummaryRow) -> anyhow::Result<()> {
        upsert_summary(&self.db, row).await
    }

    async fn preferences(&self, user_id: Uuid) -> anyhow::Result<AiPreferences> {
        load_preferences(self, user_id).await
    }

    async fn log_interaction(&self, user_id: Uuid, entry: AiInteraction) {
        log_interaction(&self.db, user_id, entry).await
    }
}

#[instrument(skip(state))]
pub async fn build_daily_summary(
    state: &AppState,
    user_id: Uuid,
    day: Date,
    refresh: bool,
) -> anyhow::Result<DailySummaryResponse> {
    summarise_day(state, state.model.as_ref(), state.config.local_now(), user_id, day, refresh).await
}

/// Closed days are materialised once and then served frozen until a refresh.
pub async fn summarise_day(
    store: &dyn DayStore,
    client: &dyn ModelClient,
    now: PrimitiveDateTime,
    user_id: Uuid,
    day: Date,
    refresh: bool,
) -> anyhow::Result<DailySummaryResponse> {
    let (totals, meals_count) = store.day_totals(user_id, day).await?;
    let (schedule, targets) = store.schedule_and_targets(user_id).await?;
    let status = day_status(day, &schedule, now);
    let stored = store.find_summary(user_id, day).await?;

    let mut response = DailySummaryResponse {
        day,
        is_closed: status == DayStatus::Closed,
        status,
        day_end_time: closing_boundary(&schedule),
        meals_count,
        totals,
        targets: targets.rounded(),
        advice: None,
    };

    match plan_summary(status, stored.as_ref(), refresh) {
        SummaryPlan::Open => {}
        SummaryPlan::ServeCached => {
            if let Some(row) = stored {
                debug!(%user_id, day = %format_ymd(day), "serving cached summary");
                response.totals = row.totals();
                response.advice = row.advice;
            }
        }
        SummaryPlan::Regenerate => {
            let prefs = store.preferences(user_id).await?;
            let payload = advice_payload(day, &totals, &targets, meals_count, &prefs.profile);
            let advice = close_day_advice(client, &payload, &prefs).await;

            store
                .upsert_summary(&DailySummaryRow {
                    user_id,
                    day,
                    calories: totals.calories,
                    proteins: totals.proteins,
                    carbs: totals.carbs,
                    fats: totals.fats,
                    status: DayStatus::Closed.as_str().to_string(),
                    advice: Some(advice.text.clone()),
                    generated_at: OffsetDateTime::now_utc(),
                })
                .await?;
            info!(%user_id, day = %format_ymd(day), ai_used = advice.ai_used, "day closed");

            if advice.ai_used {
                store
                    .log_interaction(
                        user_id,
                        AiInteraction::new(InteractionKind::DailyAdvice, &prefs.text_model)
                            .input(payload)
                            .output(json!({ "advice": advice.text }))
                            .meta(json!({ "day": format_ymd(day) })),
                    )
                    .await;
            }
            response.advice = Some(advice.text);
        }
    }

    Ok(response)
}

/// AI needs win only when their four values sum to a positive number.
pub fn choose_needs(baseline: Macros, ai: Option<&AiNeeds>) -> (Macros, NeedsSource, String) {
    match ai {
        Some(candidate) if candidate.macros.sum() > 0.0 => {
            (candidate.macros.rounded(), NeedsSource::Ai, candidate.note.clone())
        }
        _ => (baseline, NeedsSource::Estimated, BASELINE_NOTE.to_string()),
    }
}

#[instrument(skip(state))]
pub async fn build_daily_needs(state: &AppState, user_id: Uuid, day: Date) -> anyhow::Result<DailyNeedsResponse> {
    let (totals, _) = totals_for_day(&state.db, user_id, day).await?;
    let prefs = load_preferences(state, user_id).await?;
    let baseline = estimate_daily_needs(&prefs.profile);

    let payload = json!({ "profile": prefs.profile, "totals": totals });
    let ai = match generate_daily_needs(state.model.as_ref(), &payload, &prefs).await {
        Ok(needs) => Some(needs),
        Err(e) => {
            warn!(error = %e, %user_id, "daily needs unavailable, using baseline");
            None
        }
    };
    let (needs, source, note) = choose_needs(baseline, ai.as_ref());

    if let Some(ai) = &ai {
        log_interaction(
            &state.db,
            user_id,
            AiInteraction::new(InteractionKind::DailyNeeds, &prefs.text_model)
                .input(payload)
                .output(json!({ "needs": ai.macros, "note": ai.note }))
                .meta(json!({ "day": format_ymd(day), "used": source == NeedsSource::Ai })),
        )
        .await;
    }

    Ok(DailyNeedsResponse {
        day,
        needs,
        totals,
        water_ml: water_target_ml(&prefs.profile),
        source,
        note,
    })
}

/// Routine targets when a calorie target is set, else the profile baseline.
pub fn timeline_targets(targets: &MacroTargets, profile: &NutritionProfile) -> Macros {
    match targets.calories {
        Some(c) if c > 0.0 => targets.or_zero(),
        _ => estimate_daily_needs(profile),
    }
}

#[instrument(skip(state))]
pub async fn build_timeline(state: &AppState, user_id: Uuid, day: Date) -> anyhow::Result<TimelineResponse> {
    let (schedule, routine_targets) = schedule_and_targets(state, user_id).await?;
    let (totals, _) = totals_for_day(&state.db, user_id, day).await?;
    let prefs = load_preferences(state, user_id).await?;

    let targets = timeline_targets(&routine_targets, &prefs.profile);
    let remaining = targets.remaining_after(&totals).rounded();
    let phases = build_phases(&schedule, day, state.config.local_now(), &remaining);

    let payload = json!({
        "day": format_ymd(day),
        "totals": totals,
        "targets": targets,
        "remaining": remaining,
    });
    let guidance = match generate_timeline_guidance(state.model.as_ref(), &payload, &prefs).await {
        Ok(text) => {
            log_interaction(
                &state.db,
                user_id,
                AiInteraction::new(InteractionKind::TimelineGuidance, &prefs.text_model)
                    .input(payload)
                    .output(json!({ "guidance": text }))
                    .meta(json!({ "day": format_ymd(day) })),
            )
            .await;
            text
        }
        Err(e) => {
            warn!(error = %e, %user_id, "timeline guidance unavailable, using fallback");
            fallback_guidance(&remaining)
        }
    };

    Ok(TimelineResponse {
        day,
        phases,
        guidance: Some(guidance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::scripted::ScriptedClient;
    use crate::ai::AiError;
    use crate::config::AiDefaults;
    use std::sync::Mutex;
    use time::macros::{date, datetime};

    fn row(advice: Option<&str>) -> DailySummaryRow {
        DailySummaryRow {
            user_id: Uuid::nil(),
            day: date!(2026 - 03 - 09),
            calories: 1800.0,
            proteins: 90.0,
            carbs: 200.0,
            fats: 60.0,
            status: "closed".into(),
            advice: advice.map(str::to_string),
            generated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn prefs() -> AiPreferences {
        AiPreferences::defaults(&AiDefaults::default())
    }

    #[test]
    fn open_days_never_materialise() {
        assert_eq!(plan_summary(DayStatus::Open, None, true), SummaryPlan::Open);
        assert_eq!(plan_summary(DayStatus::Open, Some(&row(Some("ok"))), false), SummaryPlan::Open);
    }

    #[test]
    fn closed_day_with_advice_is_served_from_cache_unless_refreshed() {
        let stored = row(Some("Good day."));
        assert_eq!(plan_summary(DayStatus::Closed, Some(&stored), false), SummaryPlan::ServeCached);
        assert_eq!(plan_summary(DayStatus::Closed, Some(&stored), true), SummaryPlan::Regenerate);
    }

    #[test]
    fn closed_day_without_advice_regenerates() {
        assert_eq!(plan_summary(DayStatus::Closed, None, false), SummaryPlan::Regenerate);
        assert_eq!(plan_summary(DayStatus::Closed, Some(&row(None)), false), SummaryPlan::Regenerate);
        assert_eq!(plan_summary(DayStatus::Closed, Some(&row(Some("  "))), false), SummaryPlan::Regenerate);
    }

    #[tokio::test]
    async fn advice_failure_falls_back_to_fixed_sentence() {
        let client = ScriptedClient::new([Err(AiError::ServiceUnavailable("down".into()))]);
        let advice = close_day_advice(&client, &json!({}), &prefs()).await;
        assert_eq!(advice, Advice { text: ADVICE_FALLBACK.into(), ai_used: false });
    }

    #[tokio::test]
    async fn advice_prompt_carries_the_day_payload() {
        let client = ScriptedClient::replying(&["Nice balance today."]);
        let payload = advice_payload(
            date!(2026 - 03 - 09),
            &Macros { calories: 1800.0, ..Default::default() },
            &MacroTargets::default(),
            3,
            &NutritionProfile::default(),
        );
        let advice = close_day_advice(&client, &payload, &prefs()).await;

        assert!(advice.ai_used);
        assert_eq!(advice.text, "Nice balance today.");
        let prompt = &client.calls()[0].prompt;
        assert!(prompt.contains("\"meal_count\":3"));
        assert!(prompt.contains("2026-03-09"));
    }

    #[test]
    fn ai_needs_need_a_positive_sum() {
        let baseline = Macros { calories: 2000.0, proteins: 100.0, carbs: 250.0, fats: 60.0 };
        let zero = AiNeeds { macros: Macros::default(), note: "n/a".into() };
        let (needs, source, note) = choose_needs(baseline, Some(&zero));
        assert_eq!((needs, source, note.as_str()), (baseline, NeedsSource::Estimated, BASELINE_NOTE));

        let real = AiNeeds {
            macros: Macros { calories: 2400.0, proteins: 150.0, carbs: 280.0, fats: 70.0 },
            note: "Active day.".into(),
        };
        let (needs, source, note) = choose_needs(baseline, Some(&real));
        assert_eq!(needs.calories, 2400.0);
        assert_eq!(source, NeedsSource::Ai);
        assert_eq!(note, "Active day.");

        assert_eq!(choose_needs(baseline, None).1, NeedsSource::Estimated);
    }

    #[test]
    fn timeline_targets_prefer_routine_calories() {
        let profile = NutritionProfile::default();
        let routine = MacroTargets { calories: Some(1900.0), proteins: Some(120.0), ..Default::default() };
        let t = timeline_targets(&routine, &profile);
        assert_eq!(t, Macros { calories: 1900.0, proteins: 120.0, carbs: 0.0, fats: 0.0 });

        let without_calories = MacroTargets { proteins: Some(120.0), ..Default::default() };
        assert_eq!(timeline_targets(&without_calories, &profile), estimate_daily_needs(&profile));
    }

    /// In-memory day: fixed meal totals, an optional stored row, and a record
    /// of every write.
    #[derive(Default)]
    struct MemoryDay {
        totals: Macros,
        meals_count: usize,
        stored: Option<DailySummaryRow>,
        upserts: Mutex<Vec<DailySummaryRow>>,
        audits: Mutex<Vec<AiInteraction>>,
    }

    #[async_trait]
    impl DayStore for MemoryDay {
        async fn day_totals(&self, _user_id: Uuid, _day: Date) -> anyhow::Result<(Macros, usize)> {
            Ok((self.totals, self.meals_count))
        }

        async fn schedule_and_targets(&self, _user_id: Uuid) -> anyhow::Result<(RoutineSchedule, MacroTargets)> {
            Ok((RoutineSchedule::default(), MacroTargets::default()))
        }

        async fn find_summary(&self, _user_id: Uuid, _day: Date) -> anyhow::Result<Option<DailySummaryRow>> {
            Ok(self.stored.clone())
        }

        async fn upsert_summary(&self, row: &DailySummaryRow) -> anyhow::Result<()> {
            self.upserts.lock().unwrap().push(row.clone());
            Ok(())
        }

        async fn preferences(&self, _user_id: Uuid) -> anyhow::Result<AiPreferences> {
            Ok(prefs())
        }

        async fn log_interaction(&self, _user_id: Uuid, entry: AiInteraction) {
            self.audits.lock().unwrap().push(entry);
        }
    }

    fn day_with_meals(stored: Option<DailySummaryRow>) -> MemoryDay {
        MemoryDay {
            totals: Macros { calories: 2500.0, proteins: 120.0, carbs: 300.0, fats: 80.0 },
            meals_count: 4,
            stored,
            ..Default::default()
        }
    }

    const YESTERDAY: Date = date!(2026 - 03 - 09);
    const NOON: PrimitiveDateTime = datetime!(2026-03-10 12:00);

    #[tokio::test]
    async fn cached_closed_day_keeps_its_frozen_totals() {
        let store = day_with_meals(Some(row(Some("Good day."))));
        let client = ScriptedClient::default();

        let summary = summarise_day(&store, &client, NOON, Uuid::nil(), YESTERDAY, false)
            .await
            .unwrap();

        assert!(summary.is_closed);
        assert_eq!(summary.totals.calories, 1800.0);
        assert_eq!(summary.totals.fats, 60.0);
        assert_eq!(summary.advice.as_deref(), Some("Good day."));
        assert!(store.upserts.lock().unwrap().is_empty());
        assert!(store.audits.lock().unwrap().is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn regenerating_writes_the_row_and_one_audit_entry() {
        let store = day_with_meals(Some(row(Some("Old advice."))));
        let client = ScriptedClient::replying(&["Balanced day, add fibre."]);

        let summary = summarise_day(&store, &client, NOON, Uuid::nil(), YESTERDAY, true)
            .await
            .unwrap();

        assert_eq!(summary.totals.calories, 2500.0);
        assert_eq!(summary.advice.as_deref(), Some("Balanced day, add fibre."));

        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].calories, 2500.0);
        assert_eq!(upserts[0].status, "closed");
        assert_eq!(upserts[0].advice.as_deref(), Some("Balanced day, add fibre."));

        let audits = store.audits.lock().unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].kind, InteractionKind::DailyAdvice);
    }

    #[tokio::test]
    async fn model_failure_stores_the_fallback_advice_without_auditing() {
        let store = day_with_meals(None);
        let client = ScriptedClient::new([Err(AiError::ServiceUnavailable("down".into()))]);

        let summary = summarise_day(&store, &client, NOON, Uuid::nil(), YESTERDAY, false)
            .await
            .unwrap();

        assert_eq!(summary.advice.as_deref(), Some(ADVICE_FALLBACK));
        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].advice.as_deref(), Some(ADVICE_FALLBACK));
        assert!(store.audits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_day_is_neither_written_nor_advised() {
        let store = day_with_meals(None);
        let client = ScriptedClient::default();

        let summary = summarise_day(&store, &client, NOON, Uuid::nil(), date!(2026 - 03 - 10), true)
            .await
            .unwrap();

        assert!(!summary.is_closed);
        assert_eq!(summary.advice, None);
        assert_eq!(summary.totals.calories, 2500.0);
        assert!(store.upserts.lock().unwrap().is_empty());
        assert_eq!(client.call_count(), 0);
    }
}
