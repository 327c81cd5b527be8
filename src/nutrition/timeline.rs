use serde::Serialize;
use time::{Date, PrimitiveDateTime, Time};

use super::Macros;
use crate::daily::cycle::{closing_boundary, RoutineSchedule};
use crate::timefmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Past,
    Current,
    Future,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePhase {
    pub label: &'static str,
    #[serde(with = "timefmt::hhmm")]
    pub time: Time,
    pub status: PhaseStatus,
    pub suggestion: String,
}

/// Macro the rest of the day should lean on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroFocus {
    Protein,
    Carbs,
    Fat,
    Balanced,
}

impl MacroFocus {
    pub fn label(&self) -> &'static str {
        match self {
            MacroFocus::Protein => "protein",
            MacroFocus::Carbs => "carbs",
            MacroFocus::Fat => "fats",
            MacroFocus::Balanced => "balanced macros",
        }
    }
}

/// Largest positive remaining macro. Calories are not a candidate. Ties keep
/// the earlier entry of protein, carbs, fat.
pub fn macro_focus(remaining: &Macros) -> MacroFocus {
    let candidates = [
        (MacroFocus::Protein, remaining.proteins),
        (MacroFocus::Carbs, remaining.carbs),
        (MacroFocus::Fat, remaining.fats),
    ];
    let mut best: Option<(MacroFocus, f64)> = None;
    for (focus, value) in candidates {
        if value <= 0.0 {
            continue;
        }
        match best {
            Some((_, top)) if top >= value => {}
            _ => best = Some((focus, value)),
        }
    }
    best.map(|(f, _)| f).unwrap_or(MacroFocus::Balanced)
}

/// Breakfast, lunch, dinner and the closing boundary, in that order.
pub fn phase_boundaries(schedule: &RoutineSchedule) -> [(&'static str, Time); 4] {
    [
        ("Breakfast", schedule.breakfast),
        ("Lunch", schedule.lunch),
        ("Dinner", schedule.dinner),
        ("Day end", closing_boundary(schedule)),
    ]
}

/// Past days are all past, future days all future. Today the current phase is
/// the last boundary the clock has reached, or the first one before any.
pub fn phase_statuses(boundaries: &[Time], day: Date, now: PrimitiveDateTime) -> Vec<PhaseStatus> {
    let today = now.date();
    if day < today {
        return vec![PhaseStatus::Past; boundaries.len()];
    }
    if day > today {
        return vec![PhaseStatus::Future; boundaries.len()];
    }

    let current = boundaries
        .iter()
        .rposition(|b| now.time() >= *b)
        .unwrap_or(0);

    (0..boundaries.len())
        .map(|i| match i.cmp(&current) {
            std::cmp::Ordering::Less => PhaseStatus::Past,
            std::cmp::Ordering::Equal => PhaseStatus::Current,
            std::cmp::Ordering::Greater => PhaseStatus::Future,
        })
        .collect()
}

pub fn build_phases(
    schedule: &RoutineSchedule,
    day: Date,
    now: PrimitiveDateTime,
    remaining: &Macros,
) -> Vec<TimelinePhase> {
    let boundaries = phase_boundaries(schedule);
    let times: Vec<Time> = boundaries.iter().map(|(_, t)| *t).collect();
    let focus = macro_focus(remaining);

    boundaries
        .into_iter()
        .zip(phase_statuses(&times, day, now))
        .map(|((label, time), status)| TimelinePhase {
            label,
            time,
            status,
            suggestion: match status {
                PhaseStatus::Current => format!("Focus on {}.", focus.label()),
                PhaseStatus::Future => "Keep your macros balanced.".to_string(),
                PhaseStatus::Past => "Done.".to_string(),
            },
        })
        .collect()
}

/// Guidance sentence used when the model cannot produce one.
pub fn fallback_guidance(remaining: &Macros) -> String {
    format!(
        "About {} kcal left: favour {} in the next meals.",
        remaining.calories.round() as i64,
        macro_focus(remaining).label()
    )
}
