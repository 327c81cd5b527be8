use serde::{Deserialize, Deserializer, Serialize};
use time::Time;

use super::repo::Routine;
use crate::patch::nullable;
use crate::timefmt;

fn nullable_time<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<Time>>, D::Error> {
    timefmt::hhmm::option::deserialize(d).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct RoutineUpdate {
    #[serde(default, with = "timefmt::hhmm::option")]
    pub breakfast_time: Option<Time>,
    #[serde(default, with = "timefmt::hhmm::option")]
    pub lunch_time: Option<Time>,
    #[serde(default, with = "timefmt::hhmm::option")]
    pub dinner_time: Option<Time>,
    #[serde(default, deserialize_with = "nullable_time")]
    pub day_end_time: Option<Option<Time>>,
    #[serde(default, deserialize_with = "nullable")]
    pub calorie_target: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub protein_target: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub carbs_target: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub fats_target: Option<Option<f64>>,
}

impl RoutineUpdate {
    pub fn validate(&self) -> Result<(), String> {
        let targets = [
            ("calorie_target", self.calorie_target),
            ("protein_target", self.protein_target),
            ("carbs_target", self.carbs_target),
            ("fats_target", self.fats_target),
        ];
        for (field, value) in targets {
            if matches!(value.flatten(), Some(v) if v < 0.0) {
                return Err(format!("{field} must be >= 0"));
            }
        }
        Ok(())
    }

    pub fn apply(self, r: &mut Routine) {
        if let Some(t) = self.breakfast_time {
            r.breakfast_time = t;
        }
        if let Some(t) = self.lunch_time {
            r.lunch_time = t;
        }
        if let Some(t) = self.dinner_time {
            r.dinner_time = t;
        }
        if let Some(t) = self.day_end_time {
            r.day_end_time = t;
        }
        if let Some(v) = self.calorie_target {
            r.calorie_target = v;
        }
        if let Some(v) = self.protein_target {
            r.protein_target = v;
        }
        if let Some(v) = self.carbs_target {
            r.carbs_target = v;
        }
        if let Some(v) = self.fats_target {
            r.fats_target = v;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoutineResponse {
    #[serde(flatten)]
    pub routine: Routine,
    pub ai_applied: Option<bool>,
    pub ai_note: Option<String>,
}
