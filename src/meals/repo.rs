use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use time::{Date, Duration, PrimitiveDateTime, Time};
use uuid::Uuid;

use crate::nutrition::Macros;
use crate::timefmt;

const COLUMNS: &str = "id, user_id, meal_type, food_name, consumed_at, calories, proteins, carbs, fats, \
                       notes, source, ai_payload";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub meal_type: String,
    pub food_name: String,
    #[serde(with = "timefmt::local")]
    pub consumed_at: PrimitiveDateTime,
    pub calories: f64,
    pub proteins: f64,
    pub carbs: f64,
    pub fats: f64,
    pub notes: Option<String>,
    pub source: String,
    #[serde(skip)]
    pub ai_payload: Option<Value>,
}

impl Meal {
    pub fn macros(&self) -> Macros {
        Macros {
            calories: self.calories,
            proteins: self.proteins,
            carbs: self.carbs,
            fats: self.fats,
        }
    }
}

/// `[day 00:00, next day 00:00)` on the wall clock.
pub fn day_bounds(day: Date) -> (PrimitiveDateTime, PrimitiveDateTime) {
    let start = PrimitiveDateTime::new(day, Time::MIDNIGHT);
    (start, start + Duration::days(1))
}

pub async fn insert(db: &PgPool, meal: &Meal) -> anyhow::Result<Meal> {
    let sql = format!(
        r#"
        INSERT INTO meals (id, user_id, meal_type, food_name, consumed_at,
                           calories, proteins, carbs, fats, notes, source, ai_payload)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, Meal>(&sql)
        .bind(meal.id)
        .bind(meal.user_id)
        .bind(&meal.meal_type)
        .bind(&meal.food_name)
        .bind(meal.consumed_at)
        .bind(meal.calories)
        .bind(meal.proteins)
        .bind(meal.carbs)
        .bind(meal.fats)
        .bind(&meal.notes)
        .bind(&meal.source)
        .bind(&meal.ai_payload)
        .fetch_one(db)
        .await
        .context("insert meal")?;
    Ok(row)
}

pub async fn find(db: &PgPool, user_id: Uuid, meal_id: Uuid) -> anyhow::Result<Option<Meal>> {
    let sql = format!("SELECT {COLUMNS} FROM meals WHERE id = $1 AND user_id = $2");
    let row = sqlx::query_as::<_, Meal>(&sql)
        .bind(meal_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("select meal")?;
    Ok(row)
}

pub async fn update(db: &PgPool, meal: &Meal) -> anyhow::Result<Meal> {
    let sql = format!(
        r#"
        UPDATE meals SET
            meal_type = $3, food_name = $4, consumed_at = $5,
            calories = $6, proteins = $7, carbs = $8, fats = $9,
            notes = $10, source = $11, ai_payload = $12
        WHERE id = $1 AND user_id = $2
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, Meal>(&sql)
        .bind(meal.id)
        .bind(meal.user_id)
        .bind(&meal.meal_type)
        .bind(&meal.food_name)
        .bind(meal.consumed_at)
        .bind(meal.calories)
        .bind(meal.proteins)
        .bind(meal.carbs)
        .bind(meal.fats)
        .bind(&meal.notes)
        .bind(&meal.source)
        .bind(&meal.ai_payload)
        .fetch_one(db)
        .await
        .context("update meal")?;
    Ok(row)
}

/// Returns `false` when no meal with that id belongs to the user.
pub async fn delete(db: &PgPool, user_id: Uuid, meal_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM meals WHERE id = $1 AND user_id = $2")
        .bind(meal_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete meal")?;
    Ok(res.rows_affected() > 0)
}

/// Meals consumed on `day`, latest first.
pub async fn list_for_day(db: &PgPool, user_id: Uuid, day: Date) -> anyhow::Result<Vec<Meal>> {
    let (start, end) = day_bounds(day);
    let sql = format!(
        r#"
        SELECT {COLUMNS}
        FROM meals
        WHERE user_id = $1 AND consumed_at >= $2 AND consumed_at < $3
        ORDER BY consumed_at DESC
        "#
    );
    let rows = sqlx::query_as::<_, Meal>(&sql)
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(db)
        .await
        .context("list meals for day")?;
    Ok(rows)
}

pub async fn totals_for_day(db: &PgPool, user_id: Uuid, day: Date) -> anyhow::Result<(Macros, usize)> {
    let meals = list_for_day(db, user_id, day).await?;
    let count = meals.len();
    Ok((Macros::total(meals.iter().map(Meal::macros)), count))
}
