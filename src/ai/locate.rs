//! Fuzzy lookup of a logical field inside an arbitrarily shaped model reply.

use serde_json::Value;

/// Lower-cases and keeps only `[a-z0-9]`, so `"Calories (kcal)"` and
/// `"calories_kcal"` compare equal.
pub fn normalize_key(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Depth-first search for the first value whose key normalizes into `keys`.
///
/// At every object all own keys are checked before any child is descended
/// into, so a local match always outranks a nested one. Sequences are
/// searched item by item. `keys` must already be normalized.
pub fn find_by_keys<'a>(node: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    match node {
        Value::Object(map) => {
            if let Some((_, v)) = map
                .iter()
                .find(|(k, _)| keys.contains(&normalize_key(k).as_str()))
            {
                return Some(v);
            }
            map.values().find_map(|child| nested_hit(child, keys))
        }
        Value::Array(items) => items.iter().find_map(|item| nested_hit(item, keys)),
        _ => None,
    }
}

// A nested explicit null does not stop the search.
fn nested_hit<'a>(node: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    find_by_keys(node, keys).filter(|v| !v.is_null())
}
