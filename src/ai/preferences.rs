use std::time::Duration;

use super::client::GenerateRequest;
use crate::config::AiDefaults;
use crate::nutrition::NutritionProfile;
use crate::settings::repo::AiSettings;

const DEFAULT_LANGUAGE: &str = "it";

const LANGUAGE_LABELS: [(&str, &str); 5] = [
    ("it", "Italian"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
];

/// Read-only snapshot of a user's AI settings merged over the process
/// defaults. Built once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct AiPreferences {
    pub base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub timeout: Duration,
    pub temperature: Option<f64>,
    pub macro_fallback_enabled: bool,
    pub meal_type_autodetect_enabled: bool,
    pub smart_routine_enabled: bool,
    /// Stored value; the refinement driver clamps it.
    pub reasoning_cycles: i32,
    pub response_language: String,
    pub system_prompt: Option<String>,
    pub profile: NutritionProfile,
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl AiPreferences {
    pub fn resolve(settings: Option<&AiSettings>, defaults: &AiDefaults) -> Self {
        let Some(s) = settings else {
            return Self::defaults(defaults);
        };

        Self {
            base_url: non_blank(s.ollama_base_url.as_deref()).unwrap_or_else(|| defaults.base_url.clone()),
            vision_model: non_blank(Some(&s.vision_model)).unwrap_or_else(|| defaults.vision_model.clone()),
            text_model: non_blank(Some(&s.text_model)).unwrap_or_else(|| defaults.text_model.clone()),
            timeout: u64::try_from(s.timeout_seconds)
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            temperature: s.temperature,
            macro_fallback_enabled: s.macro_fallback_enabled,
            meal_type_autodetect_enabled: s.meal_type_autodetect_enabled,
            smart_routine_enabled: s.smart_routine_enabled,
            reasoning_cycles: s.reasoning_cycles,
            response_language: non_blank(Some(&s.response_language))
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.into()),
            system_prompt: non_blank(s.system_prompt.as_deref()),
            profile: s.profile(),
        }
    }

    pub fn defaults(defaults: &AiDefaults) -> Self {
        Self {
            base_url: defaults.base_url.clone(),
            vision_model: defaults.vision_model.clone(),
            text_model: defaults.text_model.clone(),
            timeout: defaults.timeout,
            temperature: None,
            macro_fallback_enabled: true,
            meal_type_autodetect_enabled: true,
            smart_routine_enabled: false,
            reasoning_cycles: 1,
            response_language: DEFAULT_LANGUAGE.into(),
            system_prompt: None,
            profile: NutritionProfile::default(),
        }
    }

    pub fn text_request(&self, prompt: String, format_json: bool) -> GenerateRequest {
        GenerateRequest {
            endpoint: self.base_url.clone(),
            model: self.text_model.clone(),
            prompt,
            images: Vec::new(),
            format_json,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }

    /// JSON-mode request to the vision model with one base64 image.
    pub fn vision_request(&self, prompt: String, image_b64: String) -> GenerateRequest {
        GenerateRequest {
            endpoint: self.base_url.clone(),
            model: self.vision_model.clone(),
            prompt,
            images: vec![image_b64],
            format_json: true,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }

    /// Human name of the response language. Unknown codes pass through.
    pub fn language_label(&self) -> &str {
        LANGUAGE_LABELS
            .iter()
            .find(|(code, _)| *code == self.response_language)
            .map(|(_, label)| *label)
            .unwrap_or(self.response_language.as_str())
    }
}

/// Wraps a task prompt with the user's system prompt and a language directive.
pub fn prefix_prompt(prompt: &str, prefs: &AiPreferences, json_mode: bool) -> String {
    let language = prefs.language_label();
    let note = if json_mode {
        format!("JSON strings must be in {language}.")
    } else {
        format!("Reply in {language}.")
    };
    let composed = format!("{prompt}\n{note}");
    match &prefs.system_prompt {
        Some(system) => format!("{system}\n\n{composed}"),
        None => composed,
    }
}
