//! Tolerant conversions from whatever the model emitted to plain numbers,
//! flags and text. Nothing here fails: absence is `0.0`, the default, or the
//! fallback.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

/// Keys probed, in order, when a number arrives wrapped in an object
/// (`{"value": 540, "unit": "kcal"}`).
const MAGNITUDE_KEYS: [&str; 4] = ["value", "amount", "total", "estimate"];

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Overflowing literals count as unparsable.
fn finite(n: f64) -> Option<f64> {
    Some(round2(n)).filter(|v| v.is_finite())
}

pub fn to_number(value: &Value) -> f64 {
    lazy_static! {
        static ref NUMBER_RE: Regex = Regex::new(r"-?\d+(?:\.\d+)?").unwrap();
    }

    match value {
        Value::Number(n) => n.as_f64().and_then(finite).unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => {
            let normalized = s.trim().replace(',', ".");
            NUMBER_RE
                .find(&normalized)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .and_then(finite)
                .unwrap_or(0.0)
        }
        Value::Object(map) => MAGNITUDE_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .map(to_number)
            .find(|n| *n != 0.0)
            .unwrap_or(0.0),
        Value::Null | Value::Array(_) => 0.0,
    }
}

pub fn to_bool(value: &Value, default: bool) -> bool {
    let token = match value {
        Value::Bool(b) => return *b,
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return default,
    };
    match token.as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

pub fn to_text(value: &Value, fallback: &str) -> String {
    let text = match value {
        Value::Null => return fallback.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

/// Like [`to_text`] for an optional lookup result, keeping "absent" distinct.
pub fn opt_text(value: Option<&Value>) -> Option<String> {
    value.map(|v| to_text(v, "")).filter(|s| !s.is_empty())
}
