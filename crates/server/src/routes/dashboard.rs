use std::collections::HashSet;

use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::dashboard_layout::{DashboardLayout, SaveDashboardLayout};
use deployment::Deployment;
use serde::Deserialize;
use tracing::info;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct LayoutParams {
    pub user_id: String,
}

fn validate_layout(layout: &SaveDashboardLayout) -> Result<(), ApiError> {
    if layout.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = layout.widget_order.iter().find(|w| !seen.insert(w.as_str())) {
        return Err(ApiError::BadRequest(format!(
            "widget {duplicate} appears more than once"
        )));
    }
    if let Some(unknown) = layout
        .visible_widgets
        .iter()
        .find(|w| !seen.contains(w.as_str()))
    {
        return Err(ApiError::BadRequest(format!(
            "visible widget {unknown} is not in widget_order"
        )));
    }
    Ok(())
}

/// GET /api/dashboard/layout?user_id
/// Saved layout, or the default one when the user never saved a layout
pub async fn get_layout(
    State(deployment): State<DeploymentImpl>,
    Query(params): Query<LayoutParams>,
) -> Result<ResponseJson<ApiResponse<DashboardLayout>>, ApiError> {
    let layout = DashboardLayout::find(&deployment.db().pool, &params.user_id)
        .await?
        .unwrap_or_else(|| DashboardLayout::default_for(&params.user_id));
    Ok(ResponseJson(ApiResponse::success(layout)))
}

/// POST /api/dashboard/layout
pub async fn save_layout(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<SaveDashboardLayout>,
) -> Result<ResponseJson<ApiResponse<DashboardLayout>>, ApiError> {
    validate_layout(&payload)?;
    let layout = DashboardLayout::upsert(&deployment.db().pool, &payload).await?;
    info!(
        user_id = %layout.user_id,
        widgets = layout.widget_order.len(),
        "Dashboard layout saved"
    );
    Ok(ResponseJson(ApiResponse::success(layout)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/dashboard/layout", get(get_layout).post(save_layout))
}
