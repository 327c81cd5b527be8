use serde::{Deserialize, Serialize};

use super::repo::AiSettings;
use crate::patch::{clean_text, nullable};

const VISION_KEYWORDS: [&str; 6] = ["llava", "vision", "ocr", "bakllava", "moondream", "minicpm"];

/// Partial update of the AI settings. Absent keys are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct AiSettingsUpdate {
    #[serde(default, deserialize_with = "nullable")]
    pub ollama_base_url: Option<Option<String>>,
    pub vision_model: Option<String>,
    pub text_model: Option<String>,
    pub timeout_seconds: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub temperature: Option<Option<f64>>,
    pub macro_fallback_enabled: Option<bool>,
    pub meal_type_autodetect_enabled: Option<bool>,
    pub smart_routine_enabled: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub age_years: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sex: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub height_cm: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub weight_kg: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub target_weight_kg: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub activity_level: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub goals: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub dietary_preferences: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub allergies: Option<Option<String>>,
    pub response_language: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub system_prompt: Option<Option<String>>,
    pub reasoning_cycles: Option<i32>,
}

fn check_range<T: PartialOrd + Copy + std::fmt::Display>(
    field: &str,
    value: Option<T>,
    min: T,
    max: T,
) -> Result<(), String> {
    match value {
        Some(v) if v < min || v > max => Err(format!("{field} must be between {min} and {max}")),
        _ => Ok(()),
    }
}

fn check_len(field: &str, value: Option<&str>, min: usize, max: usize) -> Result<(), String> {
    match value.map(|v| v.chars().count()) {
        Some(n) if n < min || n > max => {
            Err(format!("{field} must be between {min} and {max} characters"))
        }
        _ => Ok(()),
    }
}

impl AiSettingsUpdate {
    pub fn validate(&self) -> Result<(), String> {
        check_len("ollama_base_url", self.ollama_base_url.as_ref().and_then(|v| v.as_deref()), 0, 255)?;
        check_len("vision_model", self.vision_model.as_deref(), 2, 120)?;
        check_len("text_model", self.text_model.as_deref(), 2, 120)?;
        check_range("timeout_seconds", self.timeout_seconds, 30, 600)?;
        check_range("temperature", self.temperature.flatten(), 0.0, 1.5)?;
        check_range("age_years", self.age_years.flatten(), 10, 120)?;
        check_len("sex", self.sex.as_ref().and_then(|v| v.as_deref()), 0, 32)?;
        check_range("height_cm", self.height_cm.flatten(), 80.0, 250.0)?;
        check_range("weight_kg", self.weight_kg.flatten(), 25.0, 350.0)?;
        check_range("target_weight_kg", self.target_weight_kg.flatten(), 25.0, 350.0)?;
        check_len("activity_level", self.activity_level.as_ref().and_then(|v| v.as_deref()), 0, 32)?;
        check_len("goals", self.goals.as_ref().and_then(|v| v.as_deref()), 0, 2000)?;
        check_len(
            "dietary_preferences",
            self.dietary_preferences.as_ref().and_then(|v| v.as_deref()),
            0,
            2000,
        )?;
        check_len("allergies", self.allergies.as_ref().and_then(|v| v.as_deref()), 0, 2000)?;
        check_len("response_language", self.response_language.as_deref(), 0, 16)?;
        check_len("system_prompt", self.system_prompt.as_ref().and_then(|v| v.as_deref()), 0, 4000)?;
        check_range("reasoning_cycles", self.reasoning_cycles, 1, 4)?;
        Ok(())
    }

    /// Applies the present keys. Optional text is trimmed with blank meaning
    /// unset; model names and the language are trimmed.
    pub fn apply(self, s: &mut AiSettings) {
        if let Some(v) = self.ollama_base_url {
            s.ollama_base_url = clean_text(v);
        }
        if let Some(v) = self.vision_model {
            s.vision_model = v.trim().to_string();
        }
        if let Some(v) = self.text_model {
            s.text_model = v.trim().to_string();
        }
        if let Some(v) = self.timeout_seconds {
            s.timeout_seconds = v;
        }
        if let Some(v) = self.temperature {
            s.temperature = v;
        }
        if let Some(v) = self.macro_fallback_enabled {
            s.macro_fallback_enabled = v;
        }
        if let Some(v) = self.meal_type_autodetect_enabled {
            s.meal_type_autodetect_enabled = v;
        }
        if let Some(v) = self.smart_routine_enabled {
            s.smart_routine_enabled = v;
        }
        if let Some(v) = self.age_years {
            s.age_years = v;
        }
        if let Some(v) = self.sex {
            s.sex = clean_text(v);
        }
        if let Some(v) = self.height_cm {
            s.height_cm = v;
        }
        if let Some(v) = self.weight_kg {
            s.weight_kg = v;
        }
        if let Some(v) = self.target_weight_kg {
            s.target_weight_kg = v;
        }
        if let Some(v) = self.activity_level {
            s.activity_level = clean_text(v);
        }
        if let Some(v) = self.goals {
            s.goals = clean_text(v);
        }
        if let Some(v) = self.dietary_preferences {
            s.dietary_preferences = clean_text(v);
        }
        if let Some(v) = self.allergies {
            s.allergies = clean_text(v);
        }
        if let Some(v) = self.response_language {
            s.response_language = v.trim().to_string();
        }
        if let Some(v) = self.system_prompt {
            s.system_prompt = clean_text(v);
        }
        if let Some(v) = self.reasoning_cycles {
            s.reasoning_cycles = v;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelsQuery {
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ModelsResponse {
    pub base_url: String,
    pub models: Vec<String>,
    pub vision_candidates: Vec<String>,
    pub text_candidates: Vec<String>,
    pub default_vision_model: String,
    pub default_text_model: String,
    pub default_vision_installed: bool,
    pub default_text_installed: bool,
}

/// Models whose name hints at image support, or every model when none does.
pub fn vision_candidates(models: &[String]) -> Vec<String> {
    let hits: Vec<String> = models
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            VISION_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .cloned()
        .collect();
    if hits.is_empty() {
        models.to_vec()
    } else {
        hits
    }
}

impl ModelsResponse {
    pub fn group(base_url: String, models: Vec<String>, vision_default: &str, text_default: &str) -> Self {
        let vision = vision_candidates(&models);
        let mut text: Vec<String> = models.iter().filter(|m| !vision.contains(m)).cloned().collect();
        if text.is_empty() {
            text = models.clone();
        }
        Self {
            default_vision_installed: models.iter().any(|m| m == vision_default),
            default_text_installed: models.iter().any(|m| m == text_default),
            default_vision_model: vision_default.to_string(),
            default_text_model: text_default.to_string(),
            vision_candidates: vision,
            text_candidates: text,
            models,
            base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_out_of_range_values() {
        let body: AiSettingsUpdate = serde_json::from_str(r#"{"timeout_seconds": 10}"#).unwrap();
        assert!(body.validate().unwrap_err().contains("timeout_seconds"));

        let body: AiSettingsUpdate = serde_json::from_str(r#"{"temperature": 1.6}"#).unwrap();
        assert!(body.validate().is_err());

        let body: AiSettingsUpdate = serde_json::from_str(r#"{"reasoning_cycles": 5}"#).unwrap();
        assert!(body.validate().is_err());

        let body: AiSettingsUpdate = serde_json::from_str(r#"{"vision_model": "x"}"#).unwrap();
        assert!(body.validate().is_err());

        let body: AiSettingsUpdate =
            serde_json::from_str(r#"{"height_cm": 180, "weight_kg": 80, "age_years": 35, "temperature": null}"#)
                .unwrap();
        assert!(body.validate().is_ok());
    }

    #[test]
    fn apply_trims_and_clears_only_present_keys() {
        let mut settings = AiSettings::sample(uuid::Uuid::nil());
        settings.goals = Some("bulk".into());
        settings.allergies = Some("nuts".into());

        let body: AiSettingsUpdate = serde_json::from_str(
            r#"{"text_model": "  llama3:8b ", "sex": "   ", "allergies": null, "system_prompt": " Be brief. "}"#,
        )
        .unwrap();
        body.apply(&mut settings);

        assert_eq!(settings.text_model, "llama3:8b");
        assert_eq!(settings.sex, None);
        assert_eq!(settings.allergies, None);
        assert_eq!(settings.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(settings.goals.as_deref(), Some("bulk"));
        assert_eq!(settings.vision_model, "llava:latest");
    }

    #[test]
    fn groups_models_by_keyword() {
        let grouped = ModelsResponse::group(
            "http://ollama:11434".into(),
            names(&["llava:latest", "mistral:latest", "moondream:1.8b"]),
            "llava:latest",
            "llama3:8b",
        );
        assert_eq!(grouped.vision_candidates, names(&["llava:latest", "moondream:1.8b"]));
        assert_eq!(grouped.text_candidates, names(&["mistral:latest"]));
        assert!(grouped.default_vision_installed);
        assert!(!grouped.default_text_installed);
    }

    #[test]
    fn without_keyword_hits_every_model_is_a_candidate() {
        let grouped = ModelsResponse::group(
            "http://x".into(),
            names(&["mistral:latest", "qwen2:7b"]),
            "llava:latest",
            "mistral:latest",
        );
        assert_eq!(grouped.vision_candidates, grouped.models);
        assert_eq!(grouped.text_candidates, grouped.models);
    }
}
