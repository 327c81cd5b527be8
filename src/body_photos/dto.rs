use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::PrimitiveDateTime;
use uuid::Uuid;

use super::repo::BodyPhoto;
use crate::timefmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Front,
    Back,
}

impl PhotoKind {
    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "front" => Some(PhotoKind::Front),
            "back" => Some(PhotoKind::Back),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoKind::Front => "front",
            PhotoKind::Back => "back",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KindQuery {
    pub kind: Option<String>,
}

impl KindQuery {
    /// `Ok(None)` when no kind was given.
    pub fn kind(&self) -> Result<Option<PhotoKind>, String> {
        match self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            None => Ok(None),
            Some(raw) => PhotoKind::parse(raw)
                .map(Some)
                .ok_or_else(|| "Invalid photo kind.".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BodyPhotoRead {
    pub id: Uuid,
    pub kind: String,
    pub image_url: String,
    #[serde(with = "timefmt::local")]
    pub captured_at: PrimitiveDateTime,
    pub ai_summary: Option<String>,
}

impl BodyPhotoRead {
    pub fn new(photo: BodyPhoto, image_url: String) -> Self {
        Self {
            id: photo.id,
            kind: photo.kind,
            image_url,
            captured_at: photo.captured_at,
            ai_summary: photo.ai_summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub latest: BodyPhotoRead,
    pub previous: BodyPhotoRead,
    pub comparison: String,
}

/// Dates and summaries of the two photos, as sent to the model.
pub fn compare_payload(latest: &BodyPhoto, previous: &BodyPhoto) -> Value {
    json!({
        "latest": {
            "date": timefmt::format_local(latest.captured_at),
            "summary": latest.ai_summary,
        },
        "previous": {
            "date": timefmt::format_local(previous.captured_at),
            "summary": previous.ai_summary,
        },
    })
}
