use std::time::Duration;

use anyhow::Context;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Process-wide model defaults, overridden per user by their AI settings.
#[derive(Debug, Clone)]
pub struct AiDefaults {
    pub base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub timeout: Duration,
}

impl Default for AiDefaults {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            vision_model: "llava:latest".into(),
            text_model: "mistral:latest".into(),
            timeout: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub ai: AiDefaults,
    /// Offset of the wall clock that decides "today" and the time of day.
    pub utc_offset: UtcOffset,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: env_or("JWT_ISSUER", "dietly"),
            audience: env_or("JWT_AUDIENCE", "dietly-users"),
        };

        let defaults = AiDefaults::default();
        let ai = AiDefaults {
            base_url: env_or("OLLAMA_BASE_URL", &defaults.base_url),
            vision_model: env_or("OLLAMA_MODEL", &defaults.vision_model),
            text_model: env_or("OLLAMA_TEXT_MODEL", &defaults.text_model),
            timeout: std::env::var("OLLAMA_TIMEOUT")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        let offset_hours = std::env::var("APP_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse::<i8>().ok())
            .unwrap_or(0);
        let utc_offset = UtcOffset::from_hms(offset_hours, 0, 0)
            .with_context(|| format!("APP_UTC_OFFSET_HOURS out of range: {offset_hours}"))?;

        Ok(Self {
            database_url,
            jwt,
            minio_endpoint: env_or("MINIO_ENDPOINT", "http://localhost:9000"),
            minio_bucket: env_or("MINIO_BUCKET", "dietly"),
            minio_access_key: env_or("MINIO_ACCESS_KEY", "minioadmin"),
            minio_secret_key: env_or("MINIO_SECRET_KEY", "minioadmin"),
            ai,
            utc_offset,
        })
    }

    /// Current wall-clock time in the configured offset.
    pub fn local_now(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc().to_offset(self.utc_offset);
        PrimitiveDateTime::new(now.date(), now.time())
    }
}
