use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::Time;
use uuid::Uuid;

use crate::daily::cycle::RoutineSchedule;
use crate::nutrition::MacroTargets;
use crate::timefmt;

const COLUMNS: &str = "user_id, breakfast_time, lunch_time, dinner_time, day_end_time, \
                       calorie_target, protein_target, carbs_target, fats_target";

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Routine {
    #[serde(skip)]
    pub user_id: Uuid,
    #[serde(with = "timefmt::hhmm")]
    pub breakfast_time: Time,
    #[serde(with = "timefmt::hhmm")]
    pub lunch_time: Time,
    #[serde(with = "timefmt::hhmm")]
    pub dinner_time: Time,
    #[serde(with = "timefmt::hhmm::option")]
    pub day_end_time: Option<Time>,
    pub calorie_target: Option<f64>,
    pub protein_target: Option<f64>,
    pub carbs_target: Option<f64>,
    pub fats_target: Option<f64>,
}

impl Routine {
    pub fn with_defaults(user_id: Uuid) -> Self {
        let s = RoutineSchedule::default();
        Self {
            user_id,
            breakfast_time: s.breakfast,
            lunch_time: s.lunch,
            dinner_time: s.dinner,
            day_end_time: s.day_end,
            calorie_target: None,
            protein_target: None,
            carbs_target: None,
            fats_target: None,
        }
    }

    pub fn schedule(&self) -> RoutineSchedule {
        RoutineSchedule {
            breakfast: self.breakfast_time,
            lunch: self.lunch_time,
            dinner: self.dinner_time,
            day_end: self.day_end_time,
        }
    }

    pub fn targets(&self) -> MacroTargets {
        MacroTargets {
            calories: self.calorie_target,
            proteins: self.protein_target,
            carbs: self.carbs_target,
            fats: self.fats_target,
        }
    }

    pub fn set_targets(&mut self, t: MacroTargets) {
        self.calorie_target = t.calories;
        self.protein_target = t.proteins;
        self.carbs_target = t.carbs;
        self.fats_target = t.fats;
    }

    pub async fn find(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Routine>> {
        let sql = format!("SELECT {COLUMNS} FROM routines WHERE user_id = $1");
        let row = sqlx::query_as::<_, Routine>(&sql)
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("select routine")?;
        Ok(row)
    }

    pub async fn get_or_create(db: &PgPool, user_id: Uuid) -> anyhow::Result<Routine> {
        if let Some(existing) = Self::find(db, user_id).await? {
            return Ok(existing);
        }
        let defaults = Self::with_defaults(user_id);
        let sql = format!(
            r#"
            INSERT INTO routines (id, user_id, breakfast_time, lunch_time, dinner_time)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Routine>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(defaults.breakfast_time)
            .bind(defaults.lunch_time)
            .bind(defaults.dinner_time)
            .fetch_one(db)
            .await
            .context("insert default routine")?;
        Ok(row)
    }

    pub async fn save(&self, db: &PgPool) -> anyhow::Result<Routine> {
        let sql = format!(
            r#"
            UPDATE routines SET
                breakfast_time = $2, lunch_time = $3, dinner_time = $4, day_end_time = $5,
                calorie_target = $6, protein_target = $7, carbs_target = $8, fats_target = $9,
                updated_at = now()
            WHERE user_id = $1
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Routine>(&sql)
            .bind(self.user_id)
            .bind(self.breakfast_time)
            .bind(self.lunch_time)
            .bind(self.dinner_time)
            .bind(self.day_end_time)
            .bind(self.calorie_target)
            .bind(self.protein_target)
            .bind(self.carbs_target)
            .bind(self.fats_target)
            .fetch_one(db)
            .await
            .context("update routine")?;
        Ok(row)
    }
}
