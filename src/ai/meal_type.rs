use serde::{Deserialize, Serialize};
use std::fmt;

use super::locate::normalize_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Other,
}

impl MealType {
    pub const ALL: [MealType; 5] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
        MealType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Other => "other",
        }
    }

    /// Strict parse of a canonical value, as stored in the `meals` table.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ALIASES: [(&str, MealType); 6] = [
    ("colazione", MealType::Breakfast),
    ("pranzo", MealType::Lunch),
    ("cena", MealType::Dinner),
    ("spuntino", MealType::Snack),
    ("merenda", MealType::Snack),
    ("altro", MealType::Other),
];

// Checked in this order; the first list with a hit decides.
const KEYWORDS: [(MealType, &[&str]); 4] = [
    (
        MealType::Breakfast,
        &["colazione", "breakfast", "cappuccino", "cornetto", "cereali"],
    ),
    (
        MealType::Lunch,
        &["pranzo", "lunch", "primo", "secondo", "pasta", "riso"],
    ),
    (MealType::Dinner, &["cena", "dinner", "zuppa", "pesce", "carne"]),
    (
        MealType::Snack,
        &["snack", "spuntino", "merenda", "barretta", "frutta", "yogurt"],
    ),
];

/// Resolves a claimed meal type: canonical values pass, known aliases are
/// mapped, anything else is unset.
pub fn normalize_meal_type(raw: &str) -> Option<MealType> {
    let candidate = normalize_key(raw);
    if candidate.is_empty() {
        return None;
    }
    MealType::parse(&candidate).or_else(|| {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == candidate)
            .map(|(_, t)| *t)
    })
}

/// Last-resort keyword guess from the dish name and notes. Only used when no
/// explicit classification exists.
pub fn infer_meal_type_from_text(food_name: &str, notes: &str) -> MealType {
    let text = normalize_key(&format!("{food_name} {notes}"));
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(t, _)| *t)
        .unwrap_or(MealType::Other)
}
