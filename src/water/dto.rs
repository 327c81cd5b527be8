use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};

use super::repo::WaterIntake;
use crate::timefmt;

const MIN_AMOUNT_ML: i32 = 50;
const MAX_AMOUNT_ML: i32 = 2000;

fn default_amount() -> i32 {
    250
}

#[derive(Debug, Deserialize)]
pub struct WaterCreate {
    #[serde(default = "default_amount")]
    pub amount_ml: i32,
    #[serde(default, with = "timefmt::local::option")]
    pub consumed_at: Option<PrimitiveDateTime>,
}

impl WaterCreate {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_AMOUNT_ML..=MAX_AMOUNT_ML).contains(&self.amount_ml) {
            return Err(format!("amount_ml must be between {MIN_AMOUNT_ML} and {MAX_AMOUNT_ML}"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct WaterSummary {
    #[serde(with = "timefmt::ymd")]
    pub day: Date,
    pub total_ml: i64,
    pub target_ml: i32,
    pub entries: Vec<WaterIntake>,
}

impl WaterSummary {
    pub fn new(day: Date, target_ml: i32, entries: Vec<WaterIntake>) -> Self {
        Self {
            day,
            total_ml: entries.iter().map(|e| i64::from(e.amount_ml)).sum(),
            target_ml,
            entries,
        }
    }
}
