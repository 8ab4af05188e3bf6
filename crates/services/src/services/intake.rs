//! Persistence of intake sessions and completed profiles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::{
    DBService,
    models::{
        discipline::Discipline,
        intake_profile::{IntakeProfile, UpsertIntakeProfile},
        intake_session::{IntakeSession, IntakeSessionView, UpsertIntakeSession},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    normalized_profile::{NormalizedProfile, compute_normalized_profile},
    quiz_condition::IntakeResponses,
    quiz_config::quiz,
    recommendations::RecommendationService,
};

/// `current_step` recorded once a session has been completed.
pub const COMPLETED_STEP: &str = "complete";

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("unknown quiz step: {0}")]
    UnknownStep(String),
    #[error("stored profile {0} could not be decoded")]
    InvalidProfile(Uuid),
    #[error("failed to encode profile: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Snapshot of quiz progress sent on every autosave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SaveIntakeRequest {
    pub session_id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub responses: IntakeResponses,
    pub current_step: String,
    #[serde(default)]
    pub disciplines: Vec<Discipline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CompleteIntakeRequest {
    pub session_id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub responses: IntakeResponses,
    #[serde(default)]
    pub disciplines: Vec<Discipline>,
}

impl From<&SaveIntakeRequest> for CompleteIntakeRequest {
    fn from(snapshot: &SaveIntakeRequest) -> Self {
        Self {
            session_id: snapshot.session_id,
            user_id: snapshot.user_id.clone(),
            responses: snapshot.responses.clone(),
            disciplines: snapshot.disciplines.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CompleteIntakeResponse {
    pub profile_id: Uuid,
    pub normalized_profile: NormalizedProfile,
}

/// A stored profile with its JSON columns decoded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProfileView {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<String>,
    pub budget_min: f64,
    pub budget_max: f64,
    pub goals: Vec<String>,
    pub disciplines: Vec<Discipline>,
    pub normalized_profile: NormalizedProfile,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<IntakeProfile> for ProfileView {
    type Error = IntakeError;

    fn try_from(profile: IntakeProfile) -> Result<Self, Self::Error> {
        let normalized_profile = profile
            .parsed_profile()
            .ok_or(IntakeError::InvalidProfile(profile.id))?;
        Ok(Self {
            goals: profile.parsed_goals(),
            disciplines: profile.parsed_disciplines(),
            normalized_profile,
            id: profile.id,
            session_id: profile.session_id,
            user_id: profile.user_id,
            budget_min: profile.budget_min,
            budget_max: profile.budget_max,
            updated_at: profile.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct IntakeService {
    db: DBService,
    recommendations: Option<Arc<RecommendationService>>,
}

impl IntakeService {
    pub fn new(db: DBService) -> Self {
        Self {
            db,
            recommendations: None,
        }
    }

    /// Drop cached recommendations for a profile whenever it is completed again.
    pub fn with_recommendations(mut self, recommendations: Arc<RecommendationService>) -> Self {
        self.recommendations = Some(recommendations);
        self
    }

    fn is_known_step(step: &str) -> bool {
        step == COMPLETED_STEP || quiz().question_by_id(step).is_some()
    }

    /// Upsert the session snapshot. Saving the same snapshot twice is harmless.
    pub async fn save(&self, request: &SaveIntakeRequest) -> Result<IntakeSessionView, IntakeError> {
        if !Self::is_known_step(&request.current_step) {
            return Err(IntakeError::UnknownStep(request.current_step.clone()));
        }

        let session = IntakeSession::upsert(
            &self.db.pool,
            &UpsertIntakeSession {
                id: request.session_id,
                user_id: request.user_id.clone(),
                responses: request.responses.clone(),
                current_step: request.current_step.clone(),
                disciplines: request.disciplines.clone(),
            },
        )
        .await?;

        info!(
            session_id = %session.id,
            current_step = %session.current_step,
            "Intake session saved"
        );
        Ok(session.into())
    }

    /// Compute the normalized profile, store it for the session and mark the
    /// session completed. A re-take replaces the previous profile.
    pub async fn complete(
        &self,
        request: &CompleteIntakeRequest,
    ) -> Result<CompleteIntakeResponse, IntakeError> {
        let normalized = compute_normalized_profile(&request.responses, &request.disciplines);

        IntakeSession::upsert(
            &self.db.pool,
            &UpsertIntakeSession {
                id: request.session_id,
                user_id: request.user_id.clone(),
                responses: request.responses.clone(),
                current_step: COMPLETED_STEP.to_string(),
                disciplines: request.disciplines.clone(),
            },
        )
        .await?;

        let profile = IntakeProfile::upsert_for_session(
            &self.db.pool,
            &UpsertIntakeProfile {
                session_id: request.session_id,
                user_id: request.user_id.clone(),
                budget_min: normalized.budget.min,
                budget_max: normalized.budget.max,
                goals: normalized.goals.clone(),
                disciplines: normalized.selected_disciplines.clone(),
                normalized_profile: serde_json::to_value(&normalized)?,
            },
        )
        .await?;

        IntakeSession::mark_completed(&self.db.pool, request.session_id).await?;

        if let Some(recommendations) = &self.recommendations {
            recommendations.cache().invalidate_profile(profile.id);
            debug!(profile_id = %profile.id, "Cleared cached recommendations");
        }

        info!(
            session_id = %request.session_id,
            profile_id = %profile.id,
            budget_bracket = %normalized.budget_bracket,
            disciplines = normalized.selected_disciplines.len(),
            "Intake completed"
        );

        Ok(CompleteIntakeResponse {
            profile_id: profile.id,
            normalized_profile: normalized,
        })
    }

    pub async fn load(&self, session_id: Uuid) -> Result<Option<IntakeSessionView>, IntakeError> {
        Ok(IntakeSession::find_by_id(&self.db.pool, session_id)
            .await?
            .map(IntakeSessionView::from))
    }

    pub async fn profile(&self, profile_id: Uuid) -> Result<Option<ProfileView>, IntakeError> {
        IntakeProfile::find_by_id(&self.db.pool, profile_id)
            .await?
            .map(ProfileView::try_from)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::recommendation_cache::CacheKey;

    fn responses(value: serde_json::Value) -> IntakeResponses {
        value.as_object().cloned().unwrap()
    }

    async fn service() -> IntakeService {
        IntakeService::new(DBService::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_save_then_resume() {
        let service = service().await;
        let session_id = Uuid::new_v4();
        let request = SaveIntakeRequest {
            session_id,
            user_id: None,
            responses: responses(json!({ "budget_range": "25k_50k" })),
            current_step: "goals".to_string(),
            disciplines: vec![],
        };

        service.save(&request).await.unwrap();
        let saved = service.save(&request).await.unwrap();
        assert_eq!(saved.current_step, "goals");

        let loaded = service.load(session_id).await.unwrap().unwrap();
        assert_eq!(loaded.responses["budget_range"], "25k_50k");
        assert!(!loaded.completed);
        assert!(service.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_step_is_rejected() {
        let service = service().await;
        let err = service
            .save(&SaveIntakeRequest {
                session_id: Uuid::new_v4(),
                user_id: None,
                responses: IntakeResponses::new(),
                current_step: "favourite_colour".to_string(),
                disciplines: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::UnknownStep(step) if step == "favourite_colour"));
    }

    #[tokio::test]
    async fn test_complete_stores_profile_and_marks_session() {
        let service = service().await;
        let session_id = Uuid::new_v4();
        let request = CompleteIntakeRequest {
            session_id,
            user_id: Some("user-7".to_string()),
            responses: responses(json!({
                "budget_range": "50k_100k",
                "goals": ["comfort"],
                "wp": { "current_heating": "district_heating" }
            })),
            disciplines: vec![Discipline::HeatPump, Discipline::Solar],
        };

        let completed = service.complete(&request).await.unwrap();
        assert_eq!(completed.normalized_profile.budget.max, 100_000.0);
        assert!(completed.normalized_profile.disciplines.wp.is_some());
        assert!(completed.normalized_profile.disciplines.pv.is_none());

        let session = service.load(session_id).await.unwrap().unwrap();
        assert!(session.completed);
        assert!(session.completed_at.is_some());
        assert_eq!(session.current_step, COMPLETED_STEP);

        let profile = service.profile(completed.profile_id).await.unwrap().unwrap();
        assert_eq!(profile.session_id, session_id);
        assert_eq!(profile.goals, vec!["comfort"]);
        assert_eq!(profile.normalized_profile, completed.normalized_profile);

        let retake = service
            .complete(&CompleteIntakeRequest {
                responses: responses(json!({ "budget_range": "under_10k" })),
                ..request
            })
            .await
            .unwrap();
        assert_eq!(retake.profile_id, completed.profile_id);
        let profile = service.profile(retake.profile_id).await.unwrap().unwrap();
        assert_eq!(profile.budget_max, 10_000.0);
    }

    #[tokio::test]
    async fn test_retake_clears_cached_recommendations() {
        let db = DBService::new_in_memory().await.unwrap();
        let recommendations = Arc::new(RecommendationService::new(
            crate::services::recommendation_cache::DEFAULT_TTL,
            3,
        ));
        let service = IntakeService::new(db.clone()).with_recommendations(recommendations.clone());
        let request = CompleteIntakeRequest {
            session_id: Uuid::new_v4(),
            user_id: None,
            responses: responses(json!({ "budget_range": "under_10k" })),
            disciplines: vec![Discipline::HeatPump],
        };

        let first = service.complete(&request).await.unwrap();
        let before = recommendations
            .recommend(&db, Discipline::HeatPump, first.profile_id, false)
            .await
            .unwrap();
        assert_eq!(before.items[0].title, "Vaillant aroTHERM plus 7");
        let stale_key = CacheKey {
            discipline: Discipline::HeatPump,
            profile_id: first.profile_id,
            profile_updated_at: service.profile(first.profile_id).await.unwrap().unwrap().updated_at,
        };
        assert!(recommendations.cache().get(&stale_key).is_some());

        let retake = service
            .complete(&CompleteIntakeRequest {
                responses: responses(json!({ "budget_range": "over_100k" })),
                ..request
            })
            .await
            .unwrap();
        assert_eq!(retake.profile_id, first.profile_id);
        assert!(recommendations.cache().get(&stale_key).is_none());

        let after = recommendations
            .recommend(&db, Discipline::HeatPump, retake.profile_id, false)
            .await
            .unwrap();
        assert!(!after.cached);
        assert_eq!(after.items[0].title, "Nibe S1255-12");
        assert_ne!(before.items, after.items);
    }
}
