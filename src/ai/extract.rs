use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::coerce::{opt_text, round2, to_number};
use super::error::AiError;
use super::locate::find_by_keys;
use super::meal_type::{normalize_meal_type, MealType};
use crate::nutrition::Macros;

pub(crate) const CALORIES_KEYS: &[&str] = &[
    "calories",
    "calorie",
    "kcal",
    "energy",
    "kilocalories",
    "totalcalories",
    "energia",
];
pub(crate) const PROTEINS_KEYS: &[&str] = &[
    "proteins",
    "protein",
    "proteing",
    "proteinsg",
    "proteine",
    "proteinigrams",
];
pub(crate) const CARBS_KEYS: &[&str] = &[
    "carbs",
    "carbohydrates",
    "carbohydrate",
    "carbohydratesg",
    "carbsg",
    "carboidrati",
    "carboidrato",
];
pub(crate) const FATS_KEYS: &[&str] = &[
    "fats", "fat", "fatsg", "fatg", "grassi", "grasso", "lipids", "lipid",
];
const FOOD_NAME_KEYS: &[&str] = &["foodname", "dishname", "name", "mealname", "piatto", "cibo"];
const NOTES_KEYS: &[&str] = &["notes", "description", "details", "osservazioni", "descrizione"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "score", "certainty", "accuracylevel", "reliability"];
const MEAL_TYPE_KEYS: &[&str] = &["mealtype", "tipopasto", "mealcategory", "category", "categoria"];

/// Canonical fields located in a parsed reply. Text fields stay `None` when
/// the model did not provide them so each caller picks its own fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFields {
    pub meal_type: Option<MealType>,
    pub food_name: Option<String>,
    pub macros: Macros,
    pub notes: Option<String>,
    pub confidence: f64,
}

/// Reads a JSON object out of free-form model text: the whole text first,
/// then the widest `{...}` span.
pub fn extract_json(text: &str) -> Result<Value, AiError> {
    lazy_static! {
        static ref OBJECT_SPAN_RE: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    }

    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Ok(v);
    }

    let span = OBJECT_SPAN_RE
        .find(text)
        .ok_or_else(|| AiError::MalformedResponse("no JSON object in model reply".into()))?;

    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(_) => Err(AiError::MalformedResponse("model reply is not a JSON object".into())),
        Err(e) => Err(AiError::MalformedResponse(format!(
            "cannot parse JSON in model reply: {e}"
        ))),
    }
}

/// Four macros located through their synonym sets, clamped at zero.
pub fn extract_macros(parsed: &Value) -> Macros {
    let number = |keys: &[&str]| {
        find_by_keys(parsed, keys)
            .map(to_number)
            .unwrap_or(0.0)
            .max(0.0)
    };
    Macros {
        calories: number(CALORIES_KEYS),
        proteins: number(PROTEINS_KEYS),
        carbs: number(CARBS_KEYS),
        fats: number(FATS_KEYS),
    }
}

pub fn extract_analysis_fields(parsed: &Value) -> AnalysisFields {
    let meal_type = opt_text(find_by_keys(parsed, MEAL_TYPE_KEYS))
        .as_deref()
        .and_then(normalize_meal_type);
    let confidence = find_by_keys(parsed, CONFIDENCE_KEYS)
        .map(to_number)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    AnalysisFields {
        meal_type,
        food_name: opt_text(find_by_keys(parsed, FOOD_NAME_KEYS)),
        macros: extract_macros(parsed),
        notes: opt_text(find_by_keys(parsed, NOTES_KEYS)),
        confidence: round2(confidence),
    }
}
