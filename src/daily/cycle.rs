//! Open/closed state of a calendar day.
//!
//! A day is closed once it is in the past, or once today's clock reaches the
//! closing boundary. Everything here is a pure function of the day, the
//! routine and the supplied "now".

use serde::Serialize;
use time::{macros::time, Date, Duration, PrimitiveDateTime, Time};

const DEFAULT_BREAKFAST: Time = time!(08:00);
const DEFAULT_LUNCH: Time = time!(13:00);
const DEFAULT_DINNER: Time = time!(20:00);
const DAY_END_AFTER_DINNER: Duration = Duration::hours(3);

/// Meal times of a routine. A user without a routine gets the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineSchedule {
    pub breakfast: Time,
    pub lunch: Time,
    pub dinner: Time,
    pub day_end: Option<Time>,
}

impl Default for RoutineSchedule {
    fn default() -> Self {
        Self {
            breakfast: DEFAULT_BREAKFAST,
            lunch: DEFAULT_LUNCH,
            dinner: DEFAULT_DINNER,
            day_end: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Open,
    Closed,
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayStatus::Open => "open",
            DayStatus::Closed => "closed",
        }
    }
}

/// Explicit day end, else dinner + 3h truncated to whole minutes. Wraps past
/// midnight like a wall clock.
pub fn closing_boundary(schedule: &RoutineSchedule) -> Time {
    if let Some(end) = schedule.day_end {
        return end;
    }
    let t = schedule.dinner + DAY_END_AFTER_DINNER;
    Time::from_hms(t.hour(), t.minute(), 0).unwrap_or(t)
}

pub fn day_status(day: Date, schedule: &RoutineSchedule, now: PrimitiveDateTime) -> DayStatus {
    let today = now.date();
    let closed = if day < today {
        true
    } else if day > today {
        false
    } else {
        now.time() >= closing_boundary(schedule)
    };
    if closed {
        DayStatus::Closed
    } else {
        DayStatus::Open
    }
}

pub fn is_day_closed(day: Date, schedule: &RoutineSchedule, now: PrimitiveDateTime) -> bool {
    day_status(day, schedule, now) == DayStatus::Closed
}
