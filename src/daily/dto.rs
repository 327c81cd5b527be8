use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, Time};

use super::cycle::DayStatus;
use crate::ai::coerce::to_bool;
use crate::nutrition::timeline::TimelinePhase;
use crate::nutrition::{MacroTargets, Macros};
use crate::timefmt;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    #[serde(default, with = "timefmt::ymd::option")]
    pub day: Option<Date>,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl SummaryQuery {
    /// `refresh=1|true|yes|on`; anything else means no.
    pub fn wants_refresh(&self) -> bool {
        self.refresh
            .as_ref()
            .is_some_and(|r| to_bool(&Value::String(r.clone()), false))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummaryResponse {
    #[serde(with = "timefmt::ymd")]
    pub day: Date,
    pub is_closed: bool,
    pub status: DayStatus,
    #[serde(with = "timefmt::hhmm")]
    pub day_end_time: Time,
    pub meals_count: usize,
    pub totals: Macros,
    pub targets: MacroTargets,
    pub advice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NeedsSource {
    Estimated,
    Ai,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyNeedsResponse {
    #[serde(with = "timefmt::ymd")]
    pub day: Date,
    pub needs: Macros,
    pub totals: Macros,
    pub water_ml: i32,
    pub source: NeedsSource,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineResponse {
    #[serde(with = "timefmt::ymd")]
    pub day: Date,
    pub phases: Vec<TimelinePhase>,
    pub guidance: Option<String>,
}
