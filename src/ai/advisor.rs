//! Advice-style model operations. Each builds a prompt around a JSON payload
//! assembled by the caller and returns parsed, bounded values.

use base64ct::{Base64, Encoding};
use serde::Serialize;
use serde_json::Value;
use time::Time;
use tracing::instrument;

use super::client::ModelClient;
use super::coerce::{opt_text, round2, to_number, to_text};
use super::error::AiError;
use super::extract::{extract_json, extract_macros};
use super::locate::find_by_keys;
use super::preferences::{prefix_prompt, AiPreferences};
use super::refine::generate_text;
use crate::nutrition::{MacroTargets, Macros};
use crate::timefmt;

const NEEDS_NOTE_FALLBACK: &str = "Daily needs estimated automatically by the AI.";

async fn generate_json(
    client: &dyn ModelClient,
    prompt: &str,
    prefs: &AiPreferences,
) -> Result<(Value, String), AiError> {
    let raw = client
        .generate(&prefs.text_request(prefix_prompt(prompt, prefs, true), true))
        .await?;
    let parsed = extract_json(&raw)?;
    Ok((parsed, raw))
}

fn personal_context(prefs: &AiPreferences) -> String {
    let p = &prefs.profile;
    let bits: Vec<String> = [
        ("User goals", &p.goals),
        ("Dietary preferences", &p.dietary_preferences),
        ("Allergies/intolerances", &p.allergies),
    ]
    .into_iter()
    .filter_map(|(label, v)| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("{label}: {s}"))
    })
    .collect();

    if bits.is_empty() {
        "No additional context".into()
    } else {
        bits.join(" | ")
    }
}

#[instrument(skip_all)]
pub async fn generate_daily_advice(
    client: &dyn ModelClient,
    payload: &Value,
    prefs: &AiPreferences,
) -> Result<String, AiError> {
    let prompt = format!(
        "You are a virtual nutritionist. Write a short recap of the day with 3 practical, \
         realistic tips. Tailor the tips to the user's goals and preferences when available. \
         Reply in plain text, at most 7 lines. User context: {}. Day data: {payload}",
        personal_context(prefs)
    );
    generate_text(client, &prompt, prefs, None).await
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiNeeds {
    pub macros: Macros,
    pub note: String,
}

#[instrument(skip_all)]
pub async fn generate_daily_needs(
    client: &dyn ModelClient,
    payload: &Value,
    prefs: &AiPreferences,
) -> Result<AiNeeds, AiError> {
    let prompt = format!(
        "Compute the daily needs of a person from the data provided. Reply ONLY in JSON with: \
         calories (number), proteins (number), carbs (number), fats (number), note (string). \
         Use plain numbers without units. Data: {payload}"
    );
    let (parsed, _) = generate_json(client, &prompt, prefs).await?;
    Ok(AiNeeds {
        macros: extract_macros(&parsed),
        note: opt_text(find_by_keys(&parsed, &["note", "notes"]))
            .unwrap_or_else(|| NEEDS_NOTE_FALLBACK.into()),
    })
}

#[instrument(skip_all)]
pub async fn generate_timeline_guidance(
    client: &dyn ModelClient,
    payload: &Value,
    prefs: &AiPreferences,
) -> Result<String, AiError> {
    let prompt = format!(
        "Write a short tip (1-2 sentences) on how to balance macros for the rest of the day. \
         Data: {payload}"
    );
    generate_text(client, &prompt, prefs, None).await
}

/// Routine changes proposed by the model. Unparsable times and
/// non-positive targets are left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmartRoutine {
    pub breakfast: Option<Time>,
    pub lunch: Option<Time>,
    pub dinner: Option<Time>,
    pub day_end: Option<Time>,
    pub targets: MacroTargets,
    pub note: Option<String>,
    pub raw: String,
}

fn time_field(parsed: &Value, keys: &[&str]) -> Option<Time> {
    find_by_keys(parsed, keys)
        .map(|v| to_text(v, ""))
        .and_then(|s| timefmt::parse_hhmm(&s))
}

fn positive_field(parsed: &Value, keys: &[&str]) -> Option<f64> {
    find_by_keys(parsed, keys).map(to_number).filter(|v| *v > 0.0)
}

#[instrument(skip_all)]
pub async fn generate_smart_routine(
    client: &dyn ModelClient,
    payload: &Value,
    prefs: &AiPreferences,
) -> Result<SmartRoutine, AiError> {
    let prompt = format!(
        "Optimise a daily eating routine. Reply ONLY in JSON with any of the fields: \
         breakfast_time, lunch_time, dinner_time, day_end_time (HH:MM), \
         calorie_target, protein_target, carbs_target, fats_target (numbers). \
         Add a short note in the note field. Data: {payload}"
    );
    let (parsed, raw) = generate_json(client, &prompt, prefs).await?;
    Ok(SmartRoutine {
        breakfast: time_field(&parsed, &["breakfasttime", "breakfast"]),
        lunch: time_field(&parsed, &["lunchtime", "lunch"]),
        dinner: time_field(&parsed, &["dinnertime", "dinner"]),
        day_end: time_field(&parsed, &["dayendtime", "dayend"]),
        targets: MacroTargets {
            calories: positive_field(&parsed, &["calorietarget", "caloriestarget", "calories"]),
            proteins: positive_field(&parsed, &["proteintarget", "proteinstarget", "proteins"]),
            carbs: positive_field(&parsed, &["carbstarget", "carbtarget", "carbs"]),
            fats: positive_field(&parsed, &["fatstarget", "fattarget", "fats"]),
        },
        note: opt_text(find_by_keys(&parsed, &["note", "notes"])),
        raw,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyAnalysis {
    pub summary: String,
    pub body_fat_estimate: String,
    pub muscle_tone: String,
    pub posture: String,
    pub notes: String,
    pub confidence: f64,
    #[serde(skip)]
    pub raw: String,
}

#[instrument(skip(client, image, prefs), fields(image_bytes = image.len()))]
pub async fn analyze_body_photo(
    client: &dyn ModelClient,
    image: &[u8],
    kind: &str,
    prefs: &AiPreferences,
) -> Result<BodyAnalysis, AiError> {
    if image.is_empty() {
        return Err(AiError::InvalidInput("image is empty".into()));
    }
    let prompt = format!(
        "Analyse the photo of the human body and give a qualitative estimate of body composition. \
         Reply ONLY in JSON with: summary (string), body_fat_estimate (string), muscle_tone (string), \
         posture (string), notes (string), confidence (number 0-1). Photo type: {kind}."
    );
    let req = prefs.vision_request(prefix_prompt(&prompt, prefs, true), Base64::encode_string(image));
    let raw = client.generate(&req).await?;
    let parsed = extract_json(&raw)?;

    let text = |keys: &[&str], fallback: &str| {
        find_by_keys(&parsed, keys)
            .map(|v| to_text(v, fallback))
            .unwrap_or_else(|| fallback.to_string())
    };
    let confidence = find_by_keys(&parsed, &["confidence", "score"])
        .map(to_number)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Ok(BodyAnalysis {
        summary: text(&["summary"], "Body analysis available."),
        body_fat_estimate: text(&["bodyfatestimate", "bodyfat"], "n/a"),
        muscle_tone: text(&["muscletone"], "n/a"),
        posture: text(&["posture"], "n/a"),
        notes: text(&["notes"], ""),
        confidence: round2(confidence),
        raw,
    })
}

#[instrument(skip_all)]
pub async fn compare_body_photos(
    client: &dyn ModelClient,
    payload: &Value,
    prefs: &AiPreferences,
) -> Result<String, AiError> {
    let prompt = format!(
        "Compare two body photos and describe progress or regressions professionally. \
         Reply in one concise paragraph. Comparison data: {payload}"
    );
    generate_text(client, &prompt, prefs, None).await
}

#[instrument(skip_all)]
pub async fn generate_chat_response(
    client: &dyn ModelClient,
    payload: &Value,
    prefs: &AiPreferences,
) -> Result<String, AiError> {
    let prompt = format!(
        "You are DietlyBot, a nutrition assistant. Answer professionally, with empathy and \
         practical focus. Use clear sentences and realistic advice. User data: {payload}"
    );
    generate_text(client, &prompt, prefs, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::scripted::ScriptedClient;
    use crate::config::AiDefaults;
    use serde_json::json;
    use time::macros::time;

    fn prefs() -> AiPreferences {
        AiPreferences::defaults(&AiDefaults::default())
    }

    #[tokio::test]
    async fn advice_prompt_carries_profile_context_and_payload() {
        let mut p = prefs();
        p.profile.goals = Some("lose 3 kg".into());
        p.profile.allergies = Some(" ".into());
        let client = ScriptedClient::replying(&["Eat more greens."]);
        let advice = generate_daily_advice(&client, &json!({"meal_count": 3}), &p)
            .await
            .unwrap();
        assert_eq!(advice, "Eat more greens.");
        let prompt = &client.calls()[0].prompt;
        assert!(prompt.contains("User goals: lose 3 kg"));
        assert!(!prompt.contains("Allergies"));
        assert!(prompt.contains(r#"{"meal_count":3}"#));
    }

    #[tokio::test]
    async fn needs_are_read_through_synonyms() {
        let client = ScriptedClient::replying(&[
            r#"{"daily": {"kcal": "2100", "protein": 120, "carbohydrates": 250, "fat": 70}, "note": "Moderate deficit"}"#,
        ]);
        let needs = generate_daily_needs(&client, &json!({}), &prefs()).await.unwrap();
        assert_eq!(needs.macros, Macros { calories: 2100.0, proteins: 120.0, carbs: 250.0, fats: 70.0 });
        assert_eq!(needs.note, "Moderate deficit");
        assert!(client.calls()[0].format_json);
    }

    #[tokio::test]
    async fn needs_note_has_a_default() {
        let client = ScriptedClient::replying(&[r#"{"calories": 0}"#]);
        let needs = generate_daily_needs(&client, &json!({}), &prefs()).await.unwrap();
        assert!(needs.macros.is_degenerate());
        assert_eq!(needs.note, NEEDS_NOTE_FALLBACK);
    }

    #[tokio::test]
    async fn smart_routine_keeps_only_valid_times_and_positive_targets() {
        let client = ScriptedClient::replying(&[r#"{
            "breakfast_time": "7:30", "lunch_time": "noon", "dinner_time": "19:45",
            "calorie_target": 1900, "protein_target": 0, "carbs_target": "-5", "fats_target": "60 g",
            "note": "Earlier dinner helps sleep."
        }"#]);
        let r = generate_smart_routine(&client, &json!({}), &prefs()).await.unwrap();
        assert_eq!(r.breakfast, Some(time!(07:30)));
        assert_eq!(r.lunch, None);
        assert_eq!(r.dinner, Some(time!(19:45)));
        assert_eq!(r.day_end, None);
        assert_eq!(r.targets.calories, Some(1900.0));
        assert_eq!(r.targets.proteins, None);
        assert_eq!(r.targets.carbs, None);
        assert_eq!(r.targets.fats, Some(60.0));
        assert_eq!(r.note.as_deref(), Some("Earlier dinner helps sleep."));
    }

    #[tokio::test]
    async fn body_analysis_fills_defaults_and_clamps_confidence() {
        let client = ScriptedClient::replying(&[r#"{"summary": "Athletic build", "confidence": 3}"#]);
        let a = analyze_body_photo(&client, b"png", "front", &prefs()).await.unwrap();
        assert_eq!(a.summary, "Athletic build");
        assert_eq!(a.body_fat_estimate, "n/a");
        assert_eq!(a.notes, "");
        assert_eq!(a.confidence, 1.0);
        let req = &client.calls()[0];
        assert_eq!(req.model, "llava:latest");
        assert!(req.prompt.contains("Photo type: front."));
    }

    #[tokio::test]
    async fn malformed_body_analysis_is_an_error() {
        let client = ScriptedClient::replying(&["no json here"]);
        let err = analyze_body_photo(&client, b"png", "back", &prefs()).await.unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse(_)));
    }
}
