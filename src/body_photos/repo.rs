use anyhow::Context;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;
use uuid::Uuid;

use super::dto::PhotoKind;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct BodyPhoto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub image_key: String,
    pub captured_at: PrimitiveDateTime,
    pub ai_summary: Option<String>,
    pub ai_payload: Option<Value>,
}

pub async fn insert(db: &PgPool, photo: &BodyPhoto) -> anyhow::Result<BodyPhoto> {
    let row = sqlx::query_as::<_, BodyPhoto>(
        r#"
        INSERT INTO body_photos (id, user_id, kind, image_key, captured_at, ai_summary, ai_payload)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, kind, image_key, captured_at, ai_summary, ai_payload
        "#,
    )
    .bind(photo.id)
    .bind(photo.user_id)
    .bind(&photo.kind)
    .bind(&photo.image_key)
    .bind(photo.captured_at)
    .bind(&photo.ai_summary)
    .bind(&photo.ai_payload)
    .fetch_one(db)
    .await
    .context("insert body photo")?;
    Ok(row)
}

/// Newest first. `limit` of `None` returns every row.
pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    kind: Option<PhotoKind>,
    limit: Option<i64>,
) -> anyhow::Result<Vec<BodyPhoto>> {
    let rows = sqlx::query_as::<_, BodyPhoto>(
        r#"
        SELECT id, user_id, kind, image_key, captured_at, ai_summary, ai_payload
          FROM body_photos
         WHERE user_id = $1
           AND ($2::text IS NULL OR kind = $2)
         ORDER BY captured_at DESC
         LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(kind.map(|k| k.as_str()))
    .bind(limit)
    .fetch_all(db)
    .await
    .context("list body photos")?;
    Ok(rows)
}
