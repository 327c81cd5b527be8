use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, info, instrument};

use super::dto::{BodyPhotoRead, CompareResponse, KindQuery, PhotoKind};
use super::{repo, services};
use crate::{auth::AuthUser, settings::load_preferences, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/body-photos", get(list_photos).post(upload_photo))
        .route("/body-photos/compare", get(compare_photos))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn list_photos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<KindQuery>,
) -> Result<Json<Vec<BodyPhotoRead>>, (StatusCode, String)> {
    let kind = q.kind().map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;
    let photos = repo::list(&state.db, user_id, kind, None)
        .await
        .map_err(internal)?;

    let mut out = Vec::with_capacity(photos.len());
    for photo in photos {
        out.push(services::presigned(&state, photo).await.map_err(internal)?);
    }
    Ok(Json(out))
}

/// POST /body-photos (multipart)
/// Fields: `kind` (front|back), `image`
#[instrument(skip(state, mp))]
pub async fn upload_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<BodyPhotoRead>, (StatusCode, String)> {
    let mut kind: Option<String> = None;
    let mut image: Option<(Bytes, String)> = None;
    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        match field.name() {
            Some("kind") => kind = Some(field.text().await.map_err(bad_request)?),
            Some("image") => {
                let ct = field.content_type().unwrap_or_default().to_string();
                let body = field.bytes().await.map_err(bad_request)?;
                image = Some((body, ct));
            }
            _ => {}
        }
    }

    let kind = kind
        .as_deref()
        .and_then(PhotoKind::parse)
        .ok_or((StatusCode::BAD_REQUEST, "Invalid photo kind.".to_string()))?;
    let (body, content_type) =
        image.ok_or((StatusCode::BAD_REQUEST, "image is required".to_string()))?;
    if !content_type.starts_with("image/") {
        return Err((StatusCode::BAD_REQUEST, "unsupported file type".into()));
    }
    if body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image is empty".into()));
    }

    let prefs = load_preferences(&state, user_id).await.map_err(internal)?;
    let photo = services::store_and_analyze(&state, user_id, kind, body, &content_type, &prefs)
        .await
        .map_err(internal)?;
    info!(%user_id, photo_id = %photo.id, kind = kind.as_str(), "body photo stored");
    Ok(Json(photo))
}

#[instrument(skip(state))]
pub async fn compare_photos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<KindQuery>,
) -> Result<Json<CompareResponse>, (StatusCode, String)> {
    let kind = q
        .kind()
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?
        .ok_or((StatusCode::BAD_REQUEST, "kind is required".to_string()))?;
    let prefs = load_preferences(&state, user_id).await.map_err(internal)?;

    services::compare_latest(&state, user_id, kind, &prefs)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or((
            StatusCode::BAD_REQUEST,
            "At least 2 photos are needed for a comparison.".to_string(),
        ))
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "body photo request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
