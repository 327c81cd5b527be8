//! Helpers for partial-update bodies where an explicit `null` clears a field
//! and an absent key leaves it alone.

use serde::{Deserialize, Deserializer};

/// Use with `#[serde(default, deserialize_with = "crate::patch::nullable")]`
/// on an `Option<Option<T>>` field.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed text, blank collapsed to `None`.
pub fn clean_text(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "nullable")]
        goals: Option<Option<String>>,
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let absent: Body = serde_json::from_str("{}").unwrap();
        let null: Body = serde_json::from_str(r#"{"goals": null}"#).unwrap();
        let value: Body = serde_json::from_str(r#"{"goals": "cut"}"#).unwrap();
        assert_eq!(absent.goals, None);
        assert_eq!(null.goals, Some(None));
        assert_eq!(value.goals, Some(Some("cut".into())));
    }

    #[test]
    fn blank_text_collapses() {
        assert_eq!(clean_text(Some("   ".into())), None);
        assert_eq!(clean_text(Some("  lose fat ".into())), Some("lose fat".into()));
    }
}
