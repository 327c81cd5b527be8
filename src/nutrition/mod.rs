pub mod needs;
pub mod timeline;

use serde::{Deserialize, Serialize};

use crate::ai::coerce::round2;

/// Calories (kcal) and the three macronutrients (g).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Macros {
    pub calories: f64,
    pub proteins: f64,
    pub carbs: f64,
    pub fats: f64,
}

impl Macros {
    pub fn sum(&self) -> f64 {
        self.calories + self.proteins + self.carbs + self.fats
    }

    /// All four values sum to zero: the model produced nothing usable.
    pub fn is_degenerate(&self) -> bool {
        self.sum() == 0.0
    }

    pub fn rounded(self) -> Self {
        Self {
            calories: round2(self.calories),
            proteins: round2(self.proteins),
            carbs: round2(self.carbs),
            fats: round2(self.fats),
        }
    }

    /// Per-field `target - consumed`, floored at zero.
    pub fn remaining_after(&self, consumed: &Macros) -> Macros {
        Macros {
            calories: (self.calories - consumed.calories).max(0.0),
            proteins: (self.proteins - consumed.proteins).max(0.0),
            carbs: (self.carbs - consumed.carbs).max(0.0),
            fats: (self.fats - consumed.fats).max(0.0),
        }
    }

    /// `DailyTotals`: field-wise sum, rounded to 2 decimals.
    pub fn total<I: IntoIterator<Item = Macros>>(items: I) -> Macros {
        items
            .into_iter()
            .fold(Macros::default(), |acc, m| Macros {
                calories: acc.calories + m.calories,
                proteins: acc.proteins + m.proteins,
                carbs: acc.carbs + m.carbs,
                fats: acc.fats + m.fats,
            })
            .rounded()
    }
}

/// Optional per-macro targets as configured on a routine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
}

impl MacroTargets {
    pub fn any_set(&self) -> bool {
        self.calories.is_some()
            || self.proteins.is_some()
            || self.carbs.is_some()
            || self.fats.is_some()
    }

    pub fn rounded(self) -> Self {
        Self {
            calories: self.calories.map(round2),
            proteins: self.proteins.map(round2),
            carbs: self.carbs.map(round2),
            fats: self.fats.map(round2),
        }
    }

    /// Missing targets count as zero.
    pub fn or_zero(&self) -> Macros {
        Macros {
            calories: self.calories.unwrap_or(0.0),
            proteins: self.proteins.unwrap_or(0.0),
            carbs: self.carbs.unwrap_or(0.0),
            fats: self.fats.unwrap_or(0.0),
        }
    }
}

/// Body data and free-text context the user filled in their AI settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionProfile {
    pub age_years: Option<i32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    pub goals: Option<String>,
    pub dietary_preferences: Option<String>,
    pub allergies: Option<String>,
}
