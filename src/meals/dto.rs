use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use super::repo::Meal;
use crate::ai::estimation::{IngredientInput, MacroEstimate};
use crate::ai::MealType;
use crate::nutrition::Macros;
use crate::patch::nullable;
use crate::timefmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSource {
    #[default]
    Manual,
    Ai,
}

impl MealSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealSource::Manual => "manual",
            MealSource::Ai => "ai",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    #[serde(default, with = "timefmt::ymd::option")]
    pub day: Option<Date>,
}

fn check_macros(m: &Macros) -> Result<(), String> {
    let fields = [
        ("calories", m.calories),
        ("proteins", m.proteins),
        ("carbs", m.carbs),
        ("fats", m.fats),
    ];
    match fields.iter().find(|(_, v)| *v < 0.0 || !v.is_finite()) {
        Some((name, _)) => Err(format!("{name} must be a non-negative number")),
        None => Ok(()),
    }
}

fn check_food_name(name: &str) -> Result<(), String> {
    let n = name.trim().chars().count();
    if n == 0 || n > 255 {
        return Err("food_name must be between 1 and 255 characters".into());
    }
    Ok(())
}

fn check_notes(notes: Option<&str>) -> Result<(), String> {
    if notes.is_some_and(|n| n.chars().count() > 1000) {
        return Err("notes must be at most 1000 characters".into());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct MealCreate {
    pub meal_type: MealType,
    pub food_name: String,
    #[serde(default, with = "timefmt::local::option")]
    pub consumed_at: Option<PrimitiveDateTime>,
    #[serde(flatten)]
    pub macros: Macros,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub source: MealSource,
    #[serde(default)]
    pub ai_payload: Option<Value>,
}

impl MealCreate {
    pub fn validate(&self) -> Result<(), String> {
        check_food_name(&self.food_name)?;
        check_macros(&self.macros)?;
        check_notes(self.notes.as_deref())
    }

    pub fn into_meal(self, user_id: Uuid, now: PrimitiveDateTime) -> Meal {
        Meal {
            id: Uuid::new_v4(),
            user_id,
            meal_type: self.meal_type.as_str().to_string(),
            food_name: self.food_name.trim().to_string(),
            consumed_at: self.consumed_at.unwrap_or(now),
            calories: self.macros.calories,
            proteins: self.macros.proteins,
            carbs: self.macros.carbs,
            fats: self.macros.fats,
            notes: self.notes,
            source: self.source.as_str().to_string(),
            ai_payload: self.ai_payload,
        }
    }
}

/// Partial update. Absent keys are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct MealUpdate {
    pub meal_type: Option<MealType>,
    pub food_name: Option<String>,
    #[serde(default, with = "timefmt::local::option")]
    pub consumed_at: Option<PrimitiveDateTime>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    pub source: Option<MealSource>,
    #[serde(default, deserialize_with = "nullable")]
    pub ai_payload: Option<Option<Value>>,
}

impl MealUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.food_name {
            check_food_name(name)?;
        }
        check_macros(&Macros {
            calories: self.calories.unwrap_or(0.0),
            proteins: self.proteins.unwrap_or(0.0),
            carbs: self.carbs.unwrap_or(0.0),
            fats: self.fats.unwrap_or(0.0),
        })?;
        check_notes(self.notes.as_ref().and_then(|n| n.as_deref()))
    }

    pub fn apply(self, meal: &mut Meal) {
        if let Some(t) = self.meal_type {
            meal.meal_type = t.as_str().to_string();
        }
        if let Some(name) = self.food_name {
            meal.food_name = name.trim().to_string();
        }
        if let Some(at) = self.consumed_at {
            meal.consumed_at = at;
        }
        if let Some(v) = self.calories {
            meal.calories = v;
        }
        if let Some(v) = self.proteins {
            meal.proteins = v;
        }
        if let Some(v) = self.carbs {
            meal.carbs = v;
        }
        if let Some(v) = self.fats {
            meal.fats = v;
        }
        if let Some(notes) = self.notes {
            meal.notes = notes;
        }
        if let Some(source) = self.source {
            meal.source = source.as_str().to_string();
        }
        if let Some(payload) = self.ai_payload {
            meal.ai_payload = payload;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealListResponse {
    #[serde(with = "timefmt::ymd")]
    pub day: Date,
    pub totals: Macros,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Serialize)]
pub struct ImageAnalysisResponse {
    pub meal_type: MealType,
    pub food_name: String,
    #[serde(flatten)]
    pub macros: Macros,
    pub notes: String,
    pub confidence: f64,
}

impl From<MacroEstimate> for ImageAnalysisResponse {
    fn from(e: MacroEstimate) -> Self {
        Self {
            meal_type: e.meal_type.unwrap_or(MealType::Other),
            food_name: e.food_name,
            macros: e.macros,
            notes: e.notes,
            confidence: e.confidence,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ManualEstimateRequest {
    pub items: Vec<IngredientInput>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
}

impl ManualEstimateRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() || self.items.len() > 20 {
            return Err("items must contain between 1 and 20 ingredients".into());
        }
        for item in &self.items {
            if item.name.chars().count() > 120 {
                return Err("ingredient name must be at most 120 characters".into());
            }
            if item.quantity.as_deref().is_some_and(|q| q.chars().count() > 80) {
                return Err("ingredient quantity must be at most 80 characters".into());
            }
        }
        if self.hint.as_deref().is_some_and(|h| h.chars().count() > 400) {
            return Err("hint must be at most 400 characters".into());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ManualEstimateResponse {
    pub food_name: String,
    #[serde(flatten)]
    pub macros: Macros,
    pub notes: String,
    pub confidence: f64,
}

impl From<MacroEstimate> for ManualEstimateResponse {
    fn from(e: MacroEstimate) -> Self {
        Self {
            food_name: e.food_name,
            macros: e.macros,
            notes: e.notes,
            confidence: e.confidence,
        }
    }
}
