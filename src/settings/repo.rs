use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::AiDefaults;
use crate::nutrition::NutritionProfile;

const COLUMNS: &str = r#"
    user_id, ollama_base_url, vision_model, text_model, timeout_seconds, temperature,
    macro_fallback_enabled, meal_type_autodetect_enabled, smart_routine_enabled,
    response_language, system_prompt, reasoning_cycles,
    age_years, sex, height_cm, weight_kg, target_weight_kg, activity_level,
    goals, dietary_preferences, allergies, created_at, updated_at
"#;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AiSettings {
    #[serde(skip)]
    pub user_id: Uuid,
    pub ollama_base_url: Option<String>,
    pub vision_model: String,
    pub text_model: String,
    pub timeout_seconds: i32,
    pub temperature: Option<f64>,
    pub macro_fallback_enabled: bool,
    pub meal_type_autodetect_enabled: bool,
    pub smart_routine_enabled: bool,
    pub response_language: String,
    pub system_prompt: Option<String>,
    pub reasoning_cycles: i32,
    pub age_years: Option<i32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    pub goals: Option<String>,
    pub dietary_preferences: Option<String>,
    pub allergies: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl AiSettings {
    pub fn profile(&self) -> NutritionProfile {
        NutritionProfile {
            age_years: self.age_years,
            sex: self.sex.clone(),
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            target_weight_kg: self.target_weight_kg,
            activity_level: self.activity_level.clone(),
            goals: self.goals.clone(),
            dietary_preferences: self.dietary_preferences.clone(),
            allergies: self.allergies.clone(),
        }
    }

    #[cfg(test)]
    pub fn sample(user_id: Uuid) -> AiSettings {
        let defaults = AiDefaults::default();
        AiSettings {
            user_id,
            ollama_base_url: None,
            vision_model: defaults.vision_model,
            text_model: defaults.text_model,
            timeout_seconds: 180,
            temperature: Some(0.2),
            macro_fallback_enabled: true,
            meal_type_autodetect_enabled: true,
            smart_routine_enabled: false,
            response_language: "it".into(),
            system_prompt: None,
            reasoning_cycles: 1,
            age_years: None,
            sex: None,
            height_cm: None,
            weight_kg: None,
            target_weight_kg: None,
            activity_level: None,
            goals: None,
            dietary_preferences: None,
            allergies: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    pub async fn find(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<AiSettings>> {
        let sql = format!("SELECT {COLUMNS} FROM ai_settings WHERE user_id = $1");
        let row = sqlx::query_as::<_, AiSettings>(&sql)
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("select ai_settings")?;
        Ok(row)
    }

    /// Returns the user's row, inserting one seeded from the process defaults
    /// on first access.
    pub async fn get_or_create(
        db: &PgPool,
        user_id: Uuid,
        defaults: &AiDefaults,
    ) -> anyhow::Result<AiSettings> {
        if let Some(existing) = Self::find(db, user_id).await? {
            return Ok(existing);
        }

        sqlx::query(
            r#"
            INSERT INTO ai_settings (id, user_id, vision_model, text_model, timeout_seconds)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&defaults.vision_model)
        .bind(&defaults.text_model)
        .bind(i32::try_from(defaults.timeout.as_secs()).unwrap_or(180))
        .execute(db)
        .await
        .context("insert default ai_settings")?;

        Self::find(db, user_id)
            .await?
            .context("ai_settings row missing after insert")
    }

    pub async fn save(&self, db: &PgPool) -> anyhow::Result<AiSettings> {
        let sql = format!(
            r#"
            UPDATE ai_settings SET
                ollama_base_url = $2, vision_model = $3, text_model = $4,
                timeout_seconds = $5, temperature = $6,
                macro_fallback_enabled = $7, meal_type_autodetect_enabled = $8,
                smart_routine_enabled = $9, response_language = $10,
                system_prompt = $11, reasoning_cycles = $12,
                age_years = $13, sex = $14, height_cm = $15, weight_kg = $16,
                target_weight_kg = $17, activity_level = $18, goals = $19,
                dietary_preferences = $20, allergies = $21, updated_at = now()
            WHERE user_id = $1
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AiSettings>(&sql)
            .bind(self.user_id)
            .bind(&self.ollama_base_url)
            .bind(&self.vision_model)
            .bind(&self.text_model)
            .bind(self.timeout_seconds)
            .bind(self.temperature)
            .bind(self.macro_fallback_enabled)
            .bind(self.meal_type_autodetect_enabled)
            .bind(self.smart_routine_enabled)
            .bind(&self.response_language)
            .bind(&self.system_prompt)
            .bind(self.reasoning_cycles)
            .bind(self.age_years)
            .bind(&self.sex)
            .bind(self.height_cm)
            .bind(self.weight_kg)
            .bind(self.target_weight_kg)
            .bind(&self.activity_level)
            .bind(&self.goals)
            .bind(&self.dietary_preferences)
            .bind(&self.allergies)
            .fetch_one(db)
            .await
            .context("update ai_settings")?;
        Ok(row)
    }
}
