use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::discipline::Discipline;

const PROFILE_COLUMNS: &str = r#"id, session_id, user_id, budget_min, budget_max, goals,
    disciplines, normalized_profile, created_at, updated_at"#;

/// Outcome of a completed intake, one per session.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct IntakeProfile {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<String>,
    pub budget_min: f64,
    pub budget_max: f64,
    pub goals: String,              // JSON array of strings
    pub disciplines: String,        // JSON array of Discipline
    pub normalized_profile: String, // JSON-serialized normalized profile
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntakeProfile {
    pub fn parsed_goals(&self) -> Vec<String> {
        serde_json::from_str(&self.goals).unwrap_or_default()
    }

    pub fn parsed_disciplines(&self) -> Vec<Discipline> {
        serde_json::from_str(&self.disciplines).unwrap_or_default()
    }

    /// Decode the normalized profile blob into the caller's type.
    pub fn parsed_profile<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        serde_json::from_str(&self.normalized_profile).ok()
    }
}

#[derive(Debug, Clone)]
pub struct UpsertIntakeProfile {
    pub session_id: Uuid,
    pub user_id: Option<String>,
    pub budget_min: f64,
    pub budget_max: f64,
    pub goals: Vec<String>,
    pub disciplines: Vec<Discipline>,
    pub normalized_profile: Value,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

impl IntakeProfile {
    /// Insert the profile for a session, replacing it wholesale on a re-take.
    pub async fn upsert_for_session(
        pool: &SqlitePool,
        data: &UpsertIntakeProfile,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, IntakeProfile>(&format!(
            r#"INSERT INTO intake_profiles
                (id, session_id, user_id, budget_min, budget_max, goals, disciplines,
                 normalized_profile, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT(session_id) DO UPDATE SET
                user_id = excluded.user_id,
                budget_min = excluded.budget_min,
                budget_max = excluded.budget_max,
                goals = excluded.goals,
                disciplines = excluded.disciplines,
                normalized_profile = excluded.normalized_profile,
                updated_at = excluded.updated_at
            RETURNING {PROFILE_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(data.session_id)
        .bind(&data.user_id)
        .bind(data.budget_min)
        .bind(data.budget_max)
        .bind(to_json(&data.goals)?)
        .bind(to_json(&data.disciplines)?)
        .bind(to_json(&data.normalized_profile)?)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IntakeProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM intake_profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
