use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::discipline::Discipline;

const SESSION_COLUMNS: &str = r#"id, user_id, responses, current_step, disciplines, completed,
    completed_at, created_at, updated_at"#;

/// Persisted, possibly unfinished, run through the intake quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct IntakeSession {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub responses: String,   // JSON object of answers
    pub current_step: String,
    pub disciplines: String, // JSON array of Discipline
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntakeSession {
    /// Parse the stored responses; a corrupt blob reads as empty.
    pub fn parsed_responses(&self) -> Map<String, Value> {
        serde_json::from_str(&self.responses).unwrap_or_default()
    }

    pub fn parsed_disciplines(&self) -> Vec<Discipline> {
        serde_json::from_str(&self.disciplines).unwrap_or_default()
    }
}

/// Session state as returned to clients, with JSON blobs decoded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct IntakeSessionView {
    pub id: Uuid,
    pub user_id: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub responses: Map<String, Value>,
    pub current_step: String,
    pub disciplines: Vec<Discipline>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<IntakeSession> for IntakeSessionView {
    fn from(session: IntakeSession) -> Self {
        Self {
            responses: session.parsed_responses(),
            disciplines: session.parsed_disciplines(),
            id: session.id,
            user_id: session.user_id,
            current_step: session.current_step,
            completed: session.completed,
            completed_at: session.completed_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertIntakeSession {
    pub id: Uuid,
    pub user_id: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub responses: Map<String, Value>,
    pub current_step: String,
    pub disciplines: Vec<Discipline>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

impl IntakeSession {
    /// Insert or replace the session state. Saving again reopens a completed
    /// session until it is marked completed anew.
    pub async fn upsert(
        pool: &SqlitePool,
        data: &UpsertIntakeSession,
    ) -> Result<Self, sqlx::Error> {
        let responses = to_json(&data.responses)?;
        let disciplines = to_json(&data.disciplines)?;
        let now = Utc::now();
        sqlx::query_as::<_, IntakeSession>(&format!(
            r#"INSERT INTO intake_sessions
                (id, user_id, responses, current_step, disciplines, completed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $6)
            ON CONFLICT(id) DO UPDATE SET
                user_id = COALESCE(excluded.user_id, intake_sessions.user_id),
                responses = excluded.responses,
                current_step = excluded.current_step,
                disciplines = excluded.disciplines,
                completed = 0,
                completed_at = NULL,
                updated_at = excluded.updated_at
            RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(data.id)
        .bind(&data.user_id)
        .bind(responses)
        .bind(&data.current_step)
        .bind(disciplines)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IntakeSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM intake_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_completed(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"UPDATE intake_sessions
            SET completed = 1,
                completed_at = $2,
                updated_at = $2
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::DBService;

    fn upsert_payload(id: Uuid, step: &str) -> UpsertIntakeSession {
        let responses = json!({ "budget_range": "25k_50k" });
        UpsertIntakeSession {
            id,
            user_id: None,
            responses: responses.as_object().cloned().unwrap(),
            current_step: step.to_string(),
            disciplines: vec![Discipline::Solar],
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_state_and_keeps_created_at() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();

        let first = IntakeSession::upsert(&db.pool, &upsert_payload(id, "goals"))
            .await
            .unwrap();
        let second = IntakeSession::upsert(&db.pool, &upsert_payload(id, "home_type"))
            .await
            .unwrap();

        assert_eq!(second.current_step, "home_type");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.parsed_disciplines(), vec![Discipline::Solar]);
        assert_eq!(second.parsed_responses()["budget_range"], "25k_50k");
        assert!(!second.completed);
    }

    #[tokio::test]
    async fn test_mark_completed_sets_timestamp() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        IntakeSession::upsert(&db.pool, &upsert_payload(id, "disciplines"))
            .await
            .unwrap();

        IntakeSession::mark_completed(&db.pool, id).await.unwrap();

        let session = IntakeSession::find_by_id(&db.pool, id).await.unwrap().unwrap();
        assert!(session.completed);
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let db = DBService::new_in_memory().await.unwrap();
        let found = IntakeSession::find_by_id(&db.pool, Uuid::new_v4()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_saving_again_reopens_completed_session() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        IntakeSession::upsert(&db.pool, &upsert_payload(id, "disciplines"))
            .await
            .unwrap();
        IntakeSession::mark_completed(&db.pool, id).await.unwrap();

        let reopened = IntakeSession::upsert(&db.pool, &upsert_payload(id, "goals"))
            .await
            .unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());

        IntakeSession::mark_completed(&db.pool, id).await.unwrap();
        let session = IntakeSession::find_by_id(&db.pool, id).await.unwrap().unwrap();
        assert!(session.completed);
    }
}
