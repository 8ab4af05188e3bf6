use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use deployment::Deployment;
use services::services::intake::ProfileView;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// GET /api/profiles/{profile_id}
pub async fn get_profile(
    State(deployment): State<DeploymentImpl>,
    Path(profile_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Option<ProfileView>>>, ApiError> {
    let profile = deployment.intake().profile(profile_id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/profiles/{profile_id}", get(get_profile))
}
