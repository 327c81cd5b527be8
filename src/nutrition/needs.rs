//! Deterministic daily needs used when the model is unavailable or returns
//! a degenerate result.
//!
//! Energy follows Mifflin-St Jeor (1990) for BMR, scaled by an activity factor
//! and shifted by a fixed goal adjustment:
//!
//! ```text
//! BMR      = 10 * weight_kg + 6.25 * height_cm - 5 * age  (+5 male, -161 female)
//! calories = max(BMR * activity + goal, 1200)
//! ```

use lazy_static::lazy_static;
use regex::Regex;

use super::{Macros, NutritionProfile};
use crate::ai::locate::normalize_key;

/// Used when weight, height or age is missing.
const DEFAULT_BMR: f64 = 1500.0;
const DEFAULT_ACTIVITY_FACTOR: f64 = 1.35;
const MIN_CALORIES: f64 = 1200.0;
const WATER_ML_PER_KG: f64 = 35.0;
const DEFAULT_WATER_ML: i32 = 2000;

pub const BASELINE_NOTE: &str = "Estimate based on your profile data and activity level.";

const ACTIVITY_FACTORS: [(&[&str], f64); 5] = [
    (&["sedentario", "sedentary"], 1.2),
    (&["leggero", "light", "lightlyactive"], 1.375),
    (&["moderato", "moderate", "moderatelyactive"], 1.55),
    (&["alto", "high", "active", "veryactive"], 1.725),
    (&["moltoalto", "veryhigh", "extraactive"], 1.9),
];

lazy_static! {
    // Whole words, or word stems that must start a word.
    static ref LOSS_RE: Regex =
        Regex::new(r"(?i)\b(?:dimagr\w*|perder\w*|deficit|snell\w*|lose|losing|loss|cut|cutting)\b").unwrap();
    static ref GAIN_RE: Regex =
        Regex::new(r"(?i)\b(?:massa|muscol\w*|muscle\w*|aumentar\w*|bulk\w*|gain\w*)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Female,
    Male,
    Unspecified,
}

impl Sex {
    /// Free-text sex field, Italian or English.
    pub fn from_text(raw: Option<&str>) -> Self {
        let s = raw.unwrap_or_default().to_lowercase();
        if s.contains("donn") || s.contains("fem") {
            Sex::Female
        } else if s.contains("uomo") || s.contains("mas") || s.contains("male") {
            Sex::Male
        } else {
            Sex::Unspecified
        }
    }

    fn bmr_offset(&self) -> f64 {
        match self {
            Sex::Female => -161.0,
            Sex::Male => 5.0,
            Sex::Unspecified => 0.0,
        }
    }
}

pub fn activity_multiplier(level: Option<&str>) -> f64 {
    let Some(level) = level.map(normalize_key).filter(|l| !l.is_empty()) else {
        return DEFAULT_ACTIVITY_FACTOR;
    };
    ACTIVITY_FACTORS
        .iter()
        .find(|(names, _)| names.contains(&level.as_str()))
        .map(|(_, factor)| *factor)
        .unwrap_or(DEFAULT_ACTIVITY_FACTOR)
}

pub fn goal_adjustment(goals: Option<&str>) -> f64 {
    let goals = goals.unwrap_or_default();
    if LOSS_RE.is_match(goals) {
        -300.0
    } else if GAIN_RE.is_match(goals) {
        250.0
    } else {
        0.0
    }
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x > 0.0)
}

pub fn basal_metabolic_rate(profile: &NutritionProfile) -> f64 {
    let age = profile.age_years.filter(|a| *a > 0).map(f64::from);
    match (positive(profile.weight_kg), positive(profile.height_cm), age) {
        (Some(weight), Some(height), Some(age)) => {
            10.0 * weight + 6.25 * height - 5.0 * age
                + Sex::from_text(profile.sex.as_deref()).bmr_offset()
        }
        _ => DEFAULT_BMR,
    }
}

pub fn estimate_daily_needs(profile: &NutritionProfile) -> Macros {
    let calories = (basal_metabolic_rate(profile)
        * activity_multiplier(profile.activity_level.as_deref())
        + goal_adjustment(profile.goals.as_deref()))
    .max(MIN_CALORIES);

    let (proteins, fats) = match positive(profile.weight_kg) {
        Some(weight) => (weight * 1.6, weight * 0.8),
        None => (calories * 0.22 / 4.0, calories * 0.25 / 9.0),
    };
    let carbs = ((calories - proteins * 4.0 - fats * 9.0) / 4.0).max(0.0);

    Macros {
        calories,
        proteins,
        carbs,
        fats,
    }
    .rounded()
}

pub fn water_target_ml(profile: &NutritionProfile) -> i32 {
    positive(profile.weight_kg)
        .map(|w| (w * WATER_ML_PER_KG) as i32)
        .unwrap_or(DEFAULT_WATER_ML)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_profile() -> NutritionProfile {
        NutritionProfile {
            age_years: Some(30),
            sex: Some("uomo".into()),
            height_cm: Some(175.0),
            weight_kg: Some(70.0),
            activity_level: Some("moderato".into()),
            goals: None,
            ..Default::default()
        }
    }

    #[test]
    fn reference_male_profile() {
        let p = reference_profile();
        // 10*70 + 6.25*175 - 5*30 + 5
        assert_eq!(basal_metabolic_rate(&p), 1648.75);

        let needs = estimate_daily_needs(&p);
        // 1648.75 * 1.55
        assert!((needs.calories - 2555.56).abs() < 1e-9);
        assert_eq!(needs.proteins, 112.0);
        assert_eq!(needs.fats, 56.0);
        // (2555.5625 - 112*4 - 56*9) / 4
        assert!((needs.carbs - 400.89).abs() < 1e-9);
    }

    #[test]
    fn needs_are_reproducible() {
        let p = reference_profile();
        let a = estimate_daily_needs(&p);
        let b = estimate_daily_needs(&p);
        assert_eq!(a.calories.to_bits(), b.calories.to_bits());
        assert_eq!(a.carbs.to_bits(), b.carbs.to_bits());
    }

    #[test]
    fn female_offset_and_goal_adjustment() {
        let p = NutritionProfile {
            sex: Some("Donna".into()),
            goals: Some("Voglio dimagrire".into()),
            ..reference_profile()
        };
        assert_eq!(basal_metabolic_rate(&p), 1482.75);
        let expected: f64 = (1482.75 * 1.55 - 300.0) * 100.0;
        assert_eq!(estimate_daily_needs(&p).calories, expected.round() / 100.0);
    }

    #[test]
    fn incomplete_profile_uses_default_base_and_percentages() {
        let needs = estimate_daily_needs(&NutritionProfile::default());
        // 1500 * 1.35
        assert_eq!(needs.calories, 2025.0);
        assert_eq!(needs.proteins, 111.38);
        assert_eq!(needs.fats, 56.25);
    }

    #[test]
    fn calories_never_drop_below_floor() {
        let p = NutritionProfile {
            age_years: Some(90),
            sex: Some("female".into()),
            height_cm: Some(140.0),
            weight_kg: Some(35.0),
            activity_level: Some("sedentary".into()),
            goals: Some("weight loss".into()),
            ..Default::default()
        };
        assert_eq!(estimate_daily_needs(&p).calories, 1200.0);
    }

    #[test]
    fn activity_and_goal_lookup() {
        assert_eq!(activity_multiplier(Some("Molto alto")), 1.9);
        assert_eq!(activity_multiplier(Some("very_high")), 1.9);
        assert_eq!(activity_multiplier(Some("light")), 1.375);
        assert_eq!(activity_multiplier(Some("couch")), 1.35);
        assert_eq!(activity_multiplier(None), 1.35);
        assert_eq!(goal_adjustment(Some("mettere massa")), 250.0);
        assert_eq!(goal_adjustment(Some("stay healthy")), 0.0);
        assert_eq!(goal_adjustment(None), 0.0);
    }

    #[test]
    fn goal_keywords_match_whole_words() {
        assert_eq!(goal_adjustment(Some("Cut for summer")), -300.0);
        assert_eq!(goal_adjustment(Some("lose 3 kg")), -300.0);
        assert_eq!(goal_adjustment(Some("execute a plan")), 0.0);
        assert_eq!(goal_adjustment(Some("keep my haircut short")), 0.0);
        assert_eq!(goal_adjustment(Some("close the gap")), 0.0);
        assert_eq!(goal_adjustment(Some("gaining strength")), 250.0);
        assert_eq!(goal_adjustment(Some("more muscles")), 250.0);
    }

    #[test]
    fn sex_parsing_checks_female_first() {
        assert_eq!(Sex::from_text(Some("Female")), Sex::Female);
        assert_eq!(Sex::from_text(Some("male")), Sex::Male);
        assert_eq!(Sex::from_text(Some("maschio")), Sex::Male);
        assert_eq!(Sex::from_text(None), Sex::Unspecified);
    }

    #[test]
    fn hydration_target() {
        assert_eq!(water_target_ml(&reference_profile()), 2450);
        assert_eq!(water_target_ml(&NutritionProfile::default()), 2000);
    }
}
