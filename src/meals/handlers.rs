use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::dto::{
    DayQuery, ImageAnalysisResponse, ManualEstimateRequest, ManualEstimateResponse, MealCreate,
    MealListResponse, MealUpdate,
};
use super::repo::{self, Meal};
use crate::{
    ai::{
        ai_failure,
        estimation::{analyze_food_image, estimate_manual_meal},
    },
    audit::{log_interaction, AiInteraction, InteractionKind},
    auth::AuthUser,
    nutrition::Macros,
    settings::load_preferences,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/meals", get(list_meals))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route("/meals/:id", put(update_meal).delete(delete_meal))
        .route("/meals/estimate-manual", post(estimate_manual))
        .route("/meals/analyze-image", post(analyze_image))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<MealListResponse>, (StatusCode, String)> {
    let day = q.day.unwrap_or_else(|| state.config.local_now().date());
    let meals = repo::list_for_day(&state.db, user_id, day)
        .await
        .map_err(internal)?;
    let totals = Macros::total(meals.iter().map(Meal::macros));
    Ok(Json(MealListResponse { day, totals, meals }))
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<MealCreate>,
) -> Result<(StatusCode, Json<Meal>), (StatusCode, String)> {
    body.validate()
        .map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;
    let meal = body.into_meal(user_id, state.config.local_now());
    let saved = repo::insert(&state.db, &meal).await.map_err(internal)?;
    info!(%user_id, meal_id = %saved.id, "meal created");
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MealUpdate>,
) -> Result<Json<Meal>, (StatusCode, String)> {
    body.validate()
        .map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;
    let mut meal = repo::find(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    body.apply(&mut meal);
    let saved = repo::update(&state.db, &meal).await.map_err(internal)?;
    Ok(Json(saved))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if repo::delete(&state.db, user_id, id).await.map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

#[instrument(skip(state, body))]
pub async fn estimate_manual(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ManualEstimateRequest>,
) -> Result<Json<ManualEstimateResponse>, (StatusCode, String)> {
    body.validate()
        .map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;
    let prefs = load_preferences(&state, user_id).await.map_err(internal)?;
    let hint = body.hint.as_deref().unwrap_or_default();

    let result = estimate_manual_meal(state.model.as_ref(), &body.items, hint, body.meal_type, &prefs)
        .await
        .map_err(ai_failure)?;

    log_interaction(
        &state.db,
        user_id,
        AiInteraction::new(InteractionKind::ManualMealEstimate, &prefs.text_model)
            .input(json!({ "items": body.items, "hint": body.hint, "meal_type": body.meal_type }))
            .output(json!({ "estimate": result.estimate, "raw": result.raw })),
    )
    .await;

    Ok(Json(result.estimate.into()))
}

struct ImageUpload {
    body: Bytes,
    content_type: String,
    file_name: Option<String>,
}

/// POST /meals/analyze-image (multipart)
/// Fields: `image` (required), `hint` (optional free text)
#[instrument(skip(state, mp))]
pub async fn analyze_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<ImageAnalysisResponse>, (StatusCode, String)> {
    let mut image: Option<ImageUpload> = None;
    let mut hint = String::new();
    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        match field.name() {
            Some("image") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let file_name = field.file_name().map(str::to_string);
                let body = field.bytes().await.map_err(bad_request)?;
                image = Some(ImageUpload { body, content_type, file_name });
            }
            Some("hint") => hint = field.text().await.map_err(bad_request)?,
            _ => {}
        }
    }

    let image = image.ok_or((StatusCode::BAD_REQUEST, "image is required".to_string()))?;
    if !image.content_type.starts_with("image/") {
        return Err((StatusCode::BAD_REQUEST, "unsupported file type".into()));
    }
    if image.body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image is empty".into()));
    }

    let prefs = load_preferences(&state, user_id).await.map_err(internal)?;
    let result = analyze_food_image(state.model.as_ref(), &image.body, &hint, &prefs)
        .await
        .map_err(ai_failure)?;

    log_interaction(
        &state.db,
        user_id,
        AiInteraction::new(InteractionKind::ImageAnalysis, &prefs.vision_model)
            .input(json!({
                "hint": hint,
                "file_name": image.file_name,
                "content_type": image.content_type,
                "size_bytes": image.body.len(),
            }))
            .output(json!({ "estimate": result.estimate, "raw": result.raw }))
            .meta(json!({ "fallback_used": result.estimate.fallback_used })),
    )
    .await;

    Ok(Json(result.estimate.into()))
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Meal not found".into())
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "meals request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
