use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use crate::meals::repo::day_bounds;
use crate::timefmt;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WaterIntake {
    pub id: Uuid,
    pub amount_ml: i32,
    #[serde(with = "timefmt::local")]
    pub consumed_at: PrimitiveDateTime,
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    amount_ml: i32,
    consumed_at: PrimitiveDateTime,
) -> anyhow::Result<WaterIntake> {
    let row = sqlx::query_as::<_, WaterIntake>(
        r#"
        INSERT INTO water_intakes (id, user_id, amount_ml, consumed_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, amount_ml, consumed_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(amount_ml)
    .bind(consumed_at)
    .fetch_one(db)
    .await
    .context("insert water intake")?;
    Ok(row)
}

/// Intakes of `day`, earliest first.
pub async fn list_for_day(db: &PgPool, user_id: Uuid, day: Date) -> anyhow::Result<Vec<WaterIntake>> {
    let (start, end) = day_bounds(day);
    let rows = sqlx::query_as::<_, WaterIntake>(
        r#"
        SELECT id, amount_ml, consumed_at
        FROM water_intakes
        WHERE user_id = $1 AND consumed_at >= $2 AND consumed_at < $3
        ORDER BY consumed_at ASC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
    .context("list water intakes")?;
    Ok(rows)
}
