use std::str::FromStr;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::discipline::Discipline;
use deployment::Deployment;
use serde::Deserialize;
use services::services::recommendations::RecommendationSet;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    pub profile_id: Uuid,
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/recommendations/{discipline}?profile_id&refresh
pub async fn get_recommendations(
    State(deployment): State<DeploymentImpl>,
    Path(discipline): Path<String>,
    Query(params): Query<RecommendationParams>,
) -> Result<ResponseJson<ApiResponse<RecommendationSet>>, ApiError> {
    let discipline = Discipline::from_str(&discipline)
        .map_err(|_| ApiError::NotFound(format!("unknown discipline: {discipline}")))?;

    let set = deployment
        .recommendations()
        .recommend(deployment.db(), discipline, params.profile_id, params.refresh)
        .await?;

    if !set.cached {
        deployment
            .track_if_analytics_allowed(
                "recommendations_generated",
                serde_json::json!({
                    "discipline": discipline.key(),
                    "profile_id": params.profile_id.to_string(),
                    "count": set.items.len(),
                }),
            )
            .await;
    }

    Ok(ResponseJson(ApiResponse::success(set)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/recommendations/{discipline}", get(get_recommendations))
}
