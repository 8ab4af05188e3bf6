use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    catalog_query::CatalogQueryError,
    intake::IntakeError,
    quiz_flow::{QuizFlowError, ValidationError},
    recommendations::RecommendationError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    QuizFlow(#[from] QuizFlowError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Catalog(#[from] CatalogQueryError),
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Recommendation(#[from] RecommendationError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

fn catalog_status(e: &CatalogQueryError) -> StatusCode {
    match e {
        CatalogQueryError::UnknownTable(_) => StatusCode::NOT_FOUND,
        CatalogQueryError::UnknownField { .. }
        | CatalogQueryError::InvalidFilterValue { .. }
        | CatalogQueryError::InvalidColumnValue(_)
        | CatalogQueryError::EmptyWrite => StatusCode::BAD_REQUEST,
        CatalogQueryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::QuizFlow(QuizFlowError::Validation(_)) | ApiError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::QuizFlow(_) => StatusCode::BAD_REQUEST,
            ApiError::Catalog(e) => catalog_status(e),
            ApiError::Intake(IntakeError::UnknownStep(_)) => StatusCode::BAD_REQUEST,
            ApiError::Intake(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Recommendation(RecommendationError::ProfileNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Recommendation(RecommendationError::Catalog(e)) => catalog_status(e),
            ApiError::Recommendation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
