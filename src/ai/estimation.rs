//! Macro estimation from a food photo or an ingredient list, with the
//! fallback chain that keeps a degenerate model answer from reaching the user.

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::client::ModelClient;
use super::coerce::round2;
use super::error::AiError;
use super::extract::{extract_analysis_fields, extract_json};
use super::meal_type::{infer_meal_type_from_text, MealType};
use super::preferences::{prefix_prompt, AiPreferences};
use crate::nutrition::Macros;

const MAX_INGREDIENTS: usize = 20;
const DETECTED_MEAL_NAME: &str = "Detected meal";

/// Confidence given to an image estimate whose macros came from the text fallback.
const IMAGE_FALLBACK_CONFIDENCE: f64 = 0.45;
const MANUAL_DEFAULT_CONFIDENCE: f64 = 0.55;
const MANUAL_TEXT_FALLBACK_CONFIDENCE: f64 = 0.42;
const MANUAL_SYNTHETIC_CONFIDENCE: f64 = 0.2;

/// Per-ingredient last resort when the model gives nothing usable. A
/// placeholder, not a nutrition model.
const SYNTHETIC_PER_ITEM: Macros = Macros {
    calories: 110.0,
    proteins: 4.0,
    carbs: 12.0,
    fats: 4.0,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroEstimate {
    pub meal_type: Option<MealType>,
    pub food_name: String,
    #[serde(flatten)]
    pub macros: Macros,
    pub notes: String,
    pub confidence: f64,
    pub fallback_used: bool,
}

/// An estimate plus the model text it came from, kept for the audit log.
#[derive(Debug, Clone)]
pub struct Estimation {
    pub estimate: MacroEstimate,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientInput {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<String>,
}

/// Result of the text-only secondary estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextEstimate {
    pub meal_type: Option<MealType>,
    pub macros: Macros,
}

fn with_hint(mut prompt: String, hint: &str) -> String {
    let hint = hint.trim();
    if !hint.is_empty() {
        prompt.push_str(&format!(" User context: {hint}."));
    }
    prompt
}

/// Secondary estimate from a dish description alone.
#[instrument(skip(client, prefs, notes, hint))]
pub async fn estimate_macros_from_text(
    client: &dyn ModelClient,
    food_name: &str,
    notes: &str,
    hint: &str,
    prefs: &AiPreferences,
) -> Result<TextEstimate, AiError> {
    let notes = if notes.trim().is_empty() { "not available" } else { notes.trim() };
    let prompt = with_hint(
        format!(
            "Estimate the meal type and the macronutrients of the described meal and reply ONLY in JSON with: \
             meal_type (breakfast|lunch|dinner|snack|other), calories (number), proteins (number), \
             carbs (number), fats (number). Use plain numbers without units and never null. \
             Meal: {food_name}. Description: {notes}."
        ),
        hint,
    );

    let raw = client
        .generate(&prefs.text_request(prefix_prompt(&prompt, prefs, true), true))
        .await?;
    let fields = extract_analysis_fields(&extract_json(&raw)?);
    Ok(TextEstimate {
        meal_type: fields.meal_type,
        macros: fields.macros,
    })
}

#[instrument(skip(client, image, prefs), fields(image_bytes = image.len()))]
pub async fn analyze_food_image(
    client: &dyn ModelClient,
    image: &[u8],
    hint: &str,
    prefs: &AiPreferences,
) -> Result<Estimation, AiError> {
    if image.is_empty() {
        return Err(AiError::InvalidInput("image is empty".into()));
    }

    let prompt = with_hint(
        "Analyse the food in the photo and reply ONLY in JSON with these fields: \
         meal_type (breakfast|lunch|dinner|snack|other), food_name (string), \
         calories (number), proteins (number), carbs (number), fats (number), \
         notes (string), confidence (number 0-1). \
         Estimate the total macros of the visible portion. \
         Use plain numbers without units (for example calories: 540, proteins: 22.5)."
            .to_string(),
        hint,
    );
    let req = prefs.vision_request(prefix_prompt(&prompt, prefs, true), Base64::encode_string(image));
    let raw = client.generate(&req).await?;
    let fields = extract_analysis_fields(&extract_json(&raw)?);

    let mut estimate = MacroEstimate {
        meal_type: fields.meal_type,
        food_name: fields.food_name.unwrap_or_else(|| DETECTED_MEAL_NAME.into()),
        macros: fields.macros,
        notes: fields.notes.unwrap_or_default(),
        confidence: fields.confidence,
        fallback_used: false,
    };

    let needs_fallback = prefs.macro_fallback_enabled
        && (estimate.macros.is_degenerate() || estimate.meal_type.is_none());
    if needs_fallback {
        info!(
            degenerate = estimate.macros.is_degenerate(),
            meal_type_missing = estimate.meal_type.is_none(),
            "text fallback triggered"
        );
        match estimate_macros_from_text(client, &estimate.food_name, &estimate.notes, hint, prefs).await {
            Ok(fallback) if !fallback.macros.is_degenerate() => {
                estimate.macros = fallback.macros;
                estimate.meal_type = fallback.meal_type;
                estimate.fallback_used = true;
                if estimate.confidence == 0.0 {
                    estimate.confidence = IMAGE_FALLBACK_CONFIDENCE;
                }
                info!(calories = estimate.macros.calories, "text fallback used");
            }
            Ok(fallback) => {
                if estimate.meal_type.is_none() {
                    estimate.meal_type = fallback.meal_type;
                }
                debug!("text fallback was degenerate");
            }
            Err(e) => warn!(error = %e, "text fallback failed; keeping primary estimate"),
        }
    }

    let resolved = match estimate.meal_type {
        Some(t) => t,
        None if prefs.meal_type_autodetect_enabled => {
            infer_meal_type_from_text(&estimate.food_name, &estimate.notes)
        }
        None => MealType::Other,
    };
    estimate.meal_type = Some(resolved);

    Ok(Estimation { estimate, raw })
}

fn default_meal_name(names: &[&str]) -> String {
    let mut name = names.iter().take(3).copied().collect::<Vec<_>>().join(", ");
    if names.len() > 3 {
        name.push_str(" + others");
    }
    name
}

/// Estimate for a meal composed from ingredients. Once the input passes
/// validation only a failure of the primary call can make this fail.
#[instrument(skip(client, items, hint, prefs), fields(items = items.len()))]
pub async fn estimate_manual_meal(
    client: &dyn ModelClient,
    items: &[IngredientInput],
    hint: &str,
    meal_type: Option<MealType>,
    prefs: &AiPreferences,
) -> Result<Estimation, AiError> {
    let mut names = Vec::new();
    let mut lines = Vec::new();
    for item in items.iter().take(MAX_INGREDIENTS) {
        let name = item.name.trim();
        if name.is_empty() {
            continue;
        }
        names.push(name);
        match item.quantity.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => lines.push(format!("- {name} ({q})")),
            None => lines.push(format!("- {name}")),
        }
    }
    if lines.is_empty() {
        return Err(AiError::InvalidInput("add at least one valid ingredient".into()));
    }

    let mut prompt = String::from(
        "Estimate the total macronutrients of a meal made of several ingredients and reply ONLY in JSON with: \
         food_name (string), calories (number), proteins (number), carbs (number), fats (number), \
         notes (string), confidence (number 0-1). Use plain numbers without units.\n",
    );
    if let Some(t) = meal_type {
        prompt.push_str(&format!("Suggested meal type: {t}.\n"));
    }
    if !hint.trim().is_empty() {
        prompt.push_str(&format!("User details: {}\n", hint.trim()));
    }
    prompt.push_str(&format!("Ingredients:\n{}", lines.join("\n")));

    let raw = client
        .generate(&prefs.text_request(prefix_prompt(&prompt, prefs, true), true))
        .await?;

    let default_name = default_meal_name(&names);
    let estimate = match extract_json(&raw).map(|v| extract_analysis_fields(&v)) {
        Ok(fields) => MacroEstimate {
            meal_type,
            food_name: fields.food_name.unwrap_or(default_name),
            macros: fields.macros,
            notes: fields
                .notes
                .unwrap_or_else(|| format!("Estimate over {} ingredients.", lines.len())),
            confidence: if fields.confidence > 0.0 {
                fields.confidence
            } else {
                MANUAL_DEFAULT_CONFIDENCE
            },
            fallback_used: false,
        },
        Err(parse_err) => {
            warn!(error = %parse_err, "manual estimate unreadable; trying text fallback");
            let ingredient_text = lines.join("; ");
            let notes = format!("Ingredients: {ingredient_text}");
            let (macros, confidence) =
                match estimate_macros_from_text(client, &default_name, &notes, hint, prefs).await {
                    Ok(fallback) => (fallback.macros, MANUAL_TEXT_FALLBACK_CONFIDENCE),
                    Err(e) => {
                        warn!(error = %e, "text fallback failed; using per-ingredient heuristic");
                        (synthetic_macros(lines.len()), MANUAL_SYNTHETIC_CONFIDENCE)
                    }
                };
            MacroEstimate {
                meal_type,
                food_name: default_name,
                macros,
                notes: format!("Fallback estimate over ingredients: {ingredient_text}"),
                confidence,
                fallback_used: true,
            }
        }
    };

    Ok(Estimation { estimate, raw })
}

fn synthetic_macros(item_count: usize) -> Macros {
    let n = item_count.max(1) as f64;
    Macros {
        calories: round2(SYNTHETIC_PER_ITEM.calories * n),
        proteins: round2(SYNTHETIC_PER_ITEM.proteins * n),
        carbs: round2(SYNTHETIC_PER_ITEM.carbs * n),
        fats: round2(SYNTHETIC_PER_ITEM.fats * n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::scripted::ScriptedClient;
    use crate::config::AiDefaults;

    fn prefs() -> AiPreferences {
        AiPreferences::defaults(&AiDefaults::default())
    }

    fn ingredients(names: &[&str]) -> Vec<IngredientInput> {
        names
            .iter()
            .map(|n| IngredientInput { name: n.to_string(), quantity: Some("100 g".into()) })
            .collect()
    }

    fn assert_bounded(e: &MacroEstimate) {
        assert!((0.0..=1.0).contains(&e.confidence));
        for v in [e.macros.calories, e.macros.proteins, e.macros.carbs, e.macros.fats] {
            assert!(v >= 0.0);
            assert_eq!(v, round2(v));
        }
    }

    #[tokio::test]
    async fn complete_image_answer_is_used_as_is() {
        let client = ScriptedClient::replying(&[
            r#"{"meal_type":"lunch","food_name":"Risotto","calories":520,"proteins":14,"carbs":80,"fats":15,"notes":"","confidence":0.7}"#,
        ]);
        let out = analyze_food_image(&client, b"jpeg", "", &prefs()).await.unwrap();
        assert_eq!(client.call_count(), 1);
        let req = &client.calls()[0];
        assert_eq!(req.model, "llava:latest");
        assert_eq!(req.images.len(), 1);
        assert!(req.format_json);
        assert_eq!(out.estimate.meal_type, Some(MealType::Lunch));
        assert_eq!(out.estimate.macros.calories, 520.0);
        assert!(!out.estimate.fallback_used);
        assert_bounded(&out.estimate);
    }

    #[tokio::test]
    async fn degenerate_image_answer_is_replaced_by_text_fallback() {
        let client = ScriptedClient::replying(&[
            r#"{"food_name":"Pasta al pomodoro","calories":0,"proteins":0,"carbs":0,"fats":0}"#,
            r#"{"meal_type":"pranzo","calories":"450 kcal","proteins":12,"carbs":70,"fats":10}"#,
        ]);
        let out = analyze_food_image(&client, b"jpeg", "", &prefs()).await.unwrap();
        assert_eq!(client.call_count(), 2);
        assert!(client.calls()[1].prompt.contains("Pasta al pomodoro"));
        assert!(client.calls()[1].images.is_empty());

        let e = out.estimate;
        assert!(e.fallback_used);
        assert_eq!(e.macros, Macros { calories: 450.0, proteins: 12.0, carbs: 70.0, fats: 10.0 });
        assert_eq!(e.meal_type, Some(MealType::Lunch));
        assert_eq!(e.confidence, 0.45);
    }

    #[tokio::test]
    async fn fallback_failure_keeps_primary_and_infers_meal_type() {
        let client = ScriptedClient::new([
            Ok(r#"{"food_name":"Cappuccino","calories":120,"proteins":6,"carbs":10,"fats":5,"confidence":0.6}"#.to_string()),
            Err(AiError::ServiceUnavailable("down".into())),
        ]);
        let out = analyze_food_image(&client, b"jpeg", "", &prefs()).await.unwrap();
        assert_eq!(client.call_count(), 2);
        assert!(!out.estimate.fallback_used);
        assert_eq!(out.estimate.macros.calories, 120.0);
        assert_eq!(out.estimate.meal_type, Some(MealType::Breakfast));
    }

    #[tokio::test]
    async fn degenerate_fallback_only_contributes_meal_type() {
        let client = ScriptedClient::replying(&[
            r#"{"food_name":"Mystery","calories":0}"#,
            r#"{"meal_type":"snack","calories":0}"#,
        ]);
        let out = analyze_food_image(&client, b"jpeg", "", &prefs()).await.unwrap();
        assert!(!out.estimate.fallback_used);
        assert!(out.estimate.macros.is_degenerate());
        assert_eq!(out.estimate.meal_type, Some(MealType::Snack));
        assert_eq!(out.estimate.confidence, 0.0);
    }

    #[tokio::test]
    async fn disabled_toggles_skip_fallback_and_default_to_other() {
        let mut p = prefs();
        p.macro_fallback_enabled = false;
        p.meal_type_autodetect_enabled = false;
        let client = ScriptedClient::replying(&["Here you go: {\"name\": \"Pasta\", \"kcal\": 0}"]);
        let out = analyze_food_image(&client, b"jpeg", "", &p).await.unwrap();
        assert_eq!(client.call_count(), 1);
        assert_eq!(out.estimate.meal_type, Some(MealType::Other));
        assert_eq!(out.estimate.food_name, "Pasta");
    }

    #[tokio::test]
    async fn empty_image_is_rejected_without_a_call() {
        let client = ScriptedClient::default();
        let err = analyze_food_image(&client, b"", "", &prefs()).await.unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn manual_estimate_without_valid_names_makes_no_call() {
        let client = ScriptedClient::default();
        let err = estimate_manual_meal(&client, &ingredients(&["", "   "]), "", None, &prefs())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn manual_estimate_defaults_confidence_and_name() {
        let client = ScriptedClient::replying(&[r#"{"calories":610,"proteins":30,"carbs":60,"fats":25}"#]);
        let out = estimate_manual_meal(
            &client,
            &ingredients(&["rice", "chicken", "peas", "oil"]),
            "",
            Some(MealType::Dinner),
            &prefs(),
        )
        .await
        .unwrap();
        let e = out.estimate;
        assert_eq!(e.food_name, "rice, chicken, peas + others");
        assert_eq!(e.confidence, 0.55);
        assert_eq!(e.meal_type, Some(MealType::Dinner));
        assert_eq!(e.notes, "Estimate over 4 ingredients.");
        assert!(client.calls()[0].prompt.contains("- rice (100 g)"));
        assert!(client.calls()[0].prompt.contains("Suggested meal type: dinner."));
    }

    #[tokio::test]
    async fn unreadable_manual_answer_uses_text_fallback() {
        let client = ScriptedClient::replying(&[
            "I cannot answer in JSON, sorry",
            r#"{"calories":300,"proteins":20,"carbs":30,"fats":8}"#,
        ]);
        let out = estimate_manual_meal(&client, &ingredients(&["tuna", "bread"]), "", None, &prefs())
            .await
            .unwrap();
        assert_eq!(out.estimate.confidence, 0.42);
        assert_eq!(out.estimate.macros.calories, 300.0);
        assert_eq!(out.estimate.food_name, "tuna, bread");
        assert!(out.estimate.fallback_used);
        assert_eq!(out.raw, "I cannot answer in JSON, sorry");
    }

    #[tokio::test]
    async fn manual_estimate_never_fails_after_a_readable_call() {
        let client = ScriptedClient::new([
            Ok("not json".to_string()),
            Err(AiError::EmptyResponse),
        ]);
        let out = estimate_manual_meal(&client, &ingredients(&["a", "b", "c"]), "", None, &prefs())
            .await
            .unwrap();
        let e = out.estimate;
        assert_eq!(e.macros, Macros { calories: 330.0, proteins: 12.0, carbs: 36.0, fats: 12.0 });
        assert_eq!(e.confidence, 0.2);
        assert_bounded(&e);
    }

    #[tokio::test]
    async fn manual_primary_service_failure_propagates() {
        let client = ScriptedClient::new([Err(AiError::ServiceUnavailable("down".into()))]);
        let err = estimate_manual_meal(&client, &ingredients(&["apple"]), "", None, &prefs())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn only_the_first_twenty_ingredients_are_considered() {
        let names: Vec<String> = (0..25).map(|i| format!("item{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let client = ScriptedClient::replying(&[r#"{"calories":1}"#]);
        estimate_manual_meal(&client, &ingredients(&refs), "", None, &prefs())
            .await
            .unwrap();
        let prompt = &client.calls()[0].prompt;
        assert!(prompt.contains("- item19 (100 g)"));
        assert!(!prompt.contains("item20"));
    }
}
