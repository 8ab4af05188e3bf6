use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{discipline::Discipline, intake_session::IntakeSessionView};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::services::{
    intake::{CompleteIntakeRequest, CompleteIntakeResponse, SaveIntakeRequest},
    quiz_condition::IntakeResponses,
    quiz_config::{QuizConfig, quiz},
    quiz_flow::{QuizState, next_step},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct NextStepRequest {
    pub current_step: String,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub responses: IntakeResponses,
    #[serde(default)]
    pub disciplines: Vec<Discipline>,
    /// Answer to `current_step`; validated and recorded before moving on.
    #[serde(default)]
    #[ts(type = "unknown")]
    pub value: Option<Value>,
}

#[derive(Debug, Serialize, TS)]
pub struct NextStepResponse {
    /// `None` once the quiz is complete.
    pub next_step: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub responses: IntakeResponses,
    pub disciplines: Vec<Discipline>,
}

/// GET /api/intake/questions
pub async fn get_questions() -> ResponseJson<ApiResponse<QuizConfig>> {
    ResponseJson(ApiResponse::success(quiz().clone()))
}

/// POST /api/intake/next-step
/// Validate and apply an optional answer, then compute the following step
pub async fn post_next_step(
    axum::Json(payload): axum::Json<NextStepRequest>,
) -> Result<ResponseJson<ApiResponse<NextStepResponse>>, ApiError> {
    let config = quiz();
    let (next, responses, disciplines) = match payload.value {
        Some(value) => {
            let mut state = QuizState {
                current_step: payload.current_step.clone(),
                responses: payload.responses,
                disciplines: payload.disciplines,
                ..QuizState::new()
            };
            let next = state.answer(config, &payload.current_step, value)?;
            (next, state.responses, state.disciplines)
        }
        None => {
            let next = next_step(
                config,
                &payload.current_step,
                &payload.responses,
                &payload.disciplines,
            )?;
            (next, payload.responses, payload.disciplines)
        }
    };

    Ok(ResponseJson(ApiResponse::success(NextStepResponse {
        next_step: next.step_id().map(str::to_string),
        responses,
        disciplines,
    })))
}

/// POST /api/intake/save
pub async fn save_intake(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<SaveIntakeRequest>,
) -> Result<ResponseJson<ApiResponse<IntakeSessionView>>, ApiError> {
    let session = deployment.intake().save(&payload).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

/// GET /api/intake/sessions/{session_id}
pub async fn get_session(
    State(deployment): State<DeploymentImpl>,
    Path(session_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Option<IntakeSessionView>>>, ApiError> {
    let session = deployment.intake().load(session_id).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

/// POST /api/intake/complete
/// Compute and store the normalized profile for the session
pub async fn complete_intake(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CompleteIntakeRequest>,
) -> Result<ResponseJson<ApiResponse<CompleteIntakeResponse>>, ApiError> {
    let completed = deployment.intake().complete(&payload).await?;

    deployment
        .track_if_analytics_allowed(
            "intake_completed",
            serde_json::json!({
                "profile_id": completed.profile_id.to_string(),
                "budget_bracket": completed.normalized_profile.budget_bracket,
                "disciplines": completed.normalized_profile.selected_disciplines,
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(completed)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/intake",
        Router::new()
            .route("/questions", get(get_questions))
            .route("/next-step", post(post_next_step))
            .route("/save", post(save_intake))
            .route("/sessions/{session_id}", get(get_session))
            .route("/complete", post(complete_intake)),
    )
}
