use anyhow::Context;
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{compare_payload, BodyPhotoRead, CompareResponse, PhotoKind};
use super::repo::{self, BodyPhoto};
use crate::{
    ai::{
        advisor::{analyze_body_photo, compare_body_photos, BodyAnalysis},
        AiError, AiPreferences,
    },
    audit::{log_interaction, AiInteraction, InteractionKind},
    state::AppState,
    storage::body_photo_key,
};

pub const ANALYSIS_FALLBACK: &str = "AI analysis is not available for this photo.";
pub const COMPARE_FALLBACK: &str = "Comparison is not available right now.";

const URL_TTL_SECS: u64 = 60 * 60;

/// Summary and stored payload for a fresh photo. A failed analysis still
/// yields a summary.
pub fn analysis_columns(result: &Result<BodyAnalysis, AiError>) -> (String, Option<Value>) {
    match result {
        Ok(a) => (a.summary.clone(), Some(Value::String(a.raw.clone()))),
        Err(_) => (ANALYSIS_FALLBACK.to_string(), None),
    }
}

pub fn comparison_text(result: Result<String, AiError>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "body photo comparison failed");
            COMPARE_FALLBACK.to_string()
        }
    }
}

pub async fn presigned(state: &AppState, photo: BodyPhoto) -> anyhow::Result<BodyPhotoRead> {
    let url = state
        .storage
        .presign_get(&photo.image_key, URL_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {}", photo.image_key))?;
    Ok(BodyPhotoRead::new(photo, url))
}

/// Removes an object no row points to. A failure only leaves the object behind.
async fn discard_object(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete_object(key).await {
        warn!(error = %e, key, "orphaned body photo object left in storage");
    }
}

#[instrument(skip(state, body, prefs), fields(size_bytes = body.len()))]
pub async fn store_and_analyze(
    state: &AppState,
    user_id: Uuid,
    kind: PhotoKind,
    body: Bytes,
    content_type: &str,
    prefs: &AiPreferences,
) -> anyhow::Result<BodyPhotoRead> {
    let photo_id = Uuid::new_v4();
    let key = body_photo_key(user_id, photo_id, content_type);
    state
        .storage
        .put_object(&key, body.clone(), content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    let analysis = analyze_body_photo(state.model.as_ref(), &body, kind.as_str(), prefs).await;
    if let Err(e) = &analysis {
        warn!(error = %e, %photo_id, "body photo analysis failed");
    }
    let (ai_summary, ai_payload) = analysis_columns(&analysis);

    let row = BodyPhoto {
        id: photo_id,
        user_id,
        kind: kind.as_str().to_string(),
        image_key: key,
        captured_at: state.config.local_now(),
        ai_summary: Some(ai_summary),
        ai_payload,
    };
    let saved = match repo::insert(&state.db, &row).await {
        Ok(saved) => saved,
        Err(e) => {
            discard_object(state, &row.image_key).await;
            return Err(e);
        }
    };

    if let Ok(a) = &analysis {
        log_interaction(
            &state.db,
            user_id,
            AiInteraction::new(InteractionKind::BodyPhotoAnalysis, &prefs.vision_model)
                .input(json!({ "kind": kind.as_str() }))
                .output(json!({ "analysis": a, "raw": a.raw }))
                .meta(json!({ "photo_id": saved.id })),
        )
        .await;
    }

    presigned(state, saved).await
}

/// `Ok(None)` when fewer than two photos of `kind` exist.
#[instrument(skip(state, prefs))]
pub async fn compare_latest(
    state: &AppState,
    user_id: Uuid,
    kind: PhotoKind,
    prefs: &AiPreferences,
) -> anyhow::Result<Option<CompareResponse>> {
    let mut photos = repo::list(&state.db, user_id, Some(kind), Some(2)).await?;
    if photos.len() < 2 {
        return Ok(None);
    }
    let previous = photos.remove(1);
    let latest = photos.remove(0);

    let payload = compare_payload(&latest, &previous);
    let comparison = comparison_text(compare_body_photos(state.model.as_ref(), &payload, prefs).await);

    log_interaction(
        &state.db,
        user_id,
        AiInteraction::new(InteractionKind::BodyPhotoCompare, &prefs.text_model)
            .input(json!({ "latest_id": latest.id, "previous_id": previous.id }))
            .output(json!({ "comparison": comparison })),
    )
    .await;

    Ok(Some(CompareResponse {
        latest: presigned(state, latest).await?,
        previous: presigned(state, previous).await?,
        comparison,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::ai::client::scripted::ScriptedClient;
    use crate::storage::StorageClient;
    use time::macros::datetime;

    #[test]
    fn failed_analysis_keeps_a_summary_and_no_payload() {
        let (summary, payload) = analysis_columns(&Err(AiError::EmptyResponse));
        assert_eq!(summary, ANALYSIS_FALLBACK);
        assert!(payload.is_none());
    }

    #[test]
    fn successful_analysis_stores_the_raw_reply() {
        let analysis = BodyAnalysis {
            summary: "Athletic build".into(),
            body_fat_estimate: "15%".into(),
            muscle_tone: "good".into(),
            posture: "neutral".into(),
            notes: String::new(),
            confidence: 0.6,
            raw: r#"{"summary":"Athletic build"}"#.into(),
        };
        let (summary, payload) = analysis_columns(&Ok(analysis));
        assert_eq!(summary, "Athletic build");
        assert_eq!(payload, Some(Value::String(r#"{"summary":"Athletic build"}"#.into())));
    }

    #[test]
    fn comparison_falls_back_on_model_errors() {
        assert_eq!(
            comparison_text(Err(AiError::ServiceUnavailable("down".into()))),
            COMPARE_FALLBACK
        );
        assert_eq!(comparison_text(Ok("Visible progress.".into())), "Visible progress.");
    }

    /// Storage that remembers what was put and deleted.
    #[derive(Default)]
    struct RecordingStorage {
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageClient for RecordingStorage {
        async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
            self.puts.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
            Ok(format!("https://fake.local/{key}"))
        }
    }

    #[tokio::test]
    async fn failed_insert_removes_the_uploaded_object() {
        let storage = Arc::new(RecordingStorage::default());
        let mut state = AppState::fake(Arc::new(ScriptedClient::default()));
        state.storage = storage.clone() as Arc<dyn StorageClient>;
        let prefs = AiPreferences::defaults(&state.config.ai);

        // The fake pool points at a closed port, so the insert fails.
        let result = store_and_analyze(
            &state,
            Uuid::new_v4(),
            PhotoKind::Front,
            Bytes::from_static(b"\x89PNG"),
            "image/png",
            &prefs,
        )
        .await;

        assert!(result.is_err());
        let puts = storage.puts.lock().unwrap().clone();
        assert_eq!(puts.len(), 1);
        assert!(puts[0].ends_with(".png"));
        assert_eq!(*storage.deletes.lock().unwrap(), puts);
    }

    #[tokio::test]
    async fn presigned_urls_use_the_storage_key() {
        let state = AppState::fake(Arc::new(ScriptedClient::default()));
        let photo = BodyPhoto {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            kind: "back".into(),
            image_key: "body/u/p.png".into(),
            captured_at: datetime!(2026-04-02 08:15),
            ai_summary: None,
            ai_payload: None,
        };
        let read = presigned(&state, photo).await.unwrap();
        assert_eq!(read.image_url, "https://fake.local/body/u/p.png");
        assert_eq!(read.kind, "back");
    }
}
