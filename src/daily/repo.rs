use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::nutrition::Macros;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DailySummaryRow {
    pub user_id: Uuid,
    pub day: Date,
    pub calories: f64,
    pub proteins: f64,
    pub carbs: f64,
    pub fats: f64,
    pub status: String,
    pub advice: Option<String>,
    pub generated_at: OffsetDateTime,
}

impl DailySummaryRow {
    pub fn totals(&self) -> Macros {
        Macros {
            calories: self.calories,
            proteins: self.proteins,
            carbs: self.carbs,
            fats: self.fats,
        }
    }

    /// Stored advice, ignoring blank text.
    pub fn cached_advice(&self) -> Option<&str> {
        self.advice.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

pub async fn find_summary(db: &PgPool, user_id: Uuid, day: Date) -> anyhow::Result<Option<DailySummaryRow>> {
    let row = sqlx::query_as::<_, DailySummaryRow>(
        r#"
        SELECT user_id, day, calories, proteins, carbs, fats, status, advice, generated_at
        FROM daily_summaries
        WHERE user_id = $1 AND day = $2
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(db)
    .await
    .context("select daily summary")?;
    Ok(row)
}

/// One row per (user, day): a second close overwrites totals, status, advice
/// and timestamp.
pub async fn upsert_summary(db: &PgPool, row: &DailySummaryRow) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_summaries (id, user_id, day, calories, proteins, carbs, fats, status, advice, generated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (user_id, day) DO UPDATE SET
            calories = EXCLUDED.calories,
            proteins = EXCLUDED.proteins,
            carbs = EXCLUDED.carbs,
            fats = EXCLUDED.fats,
            status = EXCLUDED.status,
            advice = EXCLUDED.advice,
            generated_at = EXCLUDED.generated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(row.user_id)
    .bind(row.day)
    .bind(row.calories)
    .bind(row.proteins)
    .bind(row.carbs)
    .bind(row.fats)
    .bind(&row.status)
    .bind(&row.advice)
    .bind(row.generated_at)
    .execute(db)
    .await
    .context("upsert daily summary")?;
    Ok(())
}
