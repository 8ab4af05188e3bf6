use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use deployment::Deployment;
use serde_json::{Map, Value};
use services::services::{
    catalog_admin,
    catalog_query::{CatalogItem, CatalogQuery, PaginatedResponse, fetch_page, resolve_table},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

/// GET /api/catalog/{table}?page&limit&search&sort&dir&<filters>
pub async fn list_items(
    State(deployment): State<DeploymentImpl>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<ResponseJson<ApiResponse<PaginatedResponse<CatalogItem>>>, ApiError> {
    let table = resolve_table(&table)?;
    let query = CatalogQuery::from_params(params);
    let page = fetch_page(&deployment.db().pool, table, &query).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// POST /api/catalog/{table}
pub async fn create_item(
    State(deployment): State<DeploymentImpl>,
    Path(table): Path<String>,
    axum::Json(payload): axum::Json<Map<String, Value>>,
) -> Result<ResponseJson<ApiResponse<CatalogItem>>, ApiError> {
    let table = resolve_table(&table)?;
    let item = catalog_admin::create_item(&deployment.db().pool, table, &payload).await?;

    deployment
        .track_if_analytics_allowed(
            "catalog_item_created",
            serde_json::json!({ "table": table.name, "id": item.get("id") }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(item)))
}

/// GET /api/catalog/{table}/{id}
pub async fn get_item(
    State(deployment): State<DeploymentImpl>,
    Path((table, id)): Path<(String, i64)>,
) -> Result<ResponseJson<ApiResponse<Option<CatalogItem>>>, ApiError> {
    let table = resolve_table(&table)?;
    let item = catalog_admin::get_item(&deployment.db().pool, table, id).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

/// PUT /api/catalog/{table}/{id}
/// Partial update; unknown ids yield `null`
pub async fn update_item(
    State(deployment): State<DeploymentImpl>,
    Path((table, id)): Path<(String, i64)>,
    axum::Json(payload): axum::Json<Map<String, Value>>,
) -> Result<ResponseJson<ApiResponse<Option<CatalogItem>>>, ApiError> {
    let table = resolve_table(&table)?;
    let item = catalog_admin::update_item(&deployment.db().pool, table, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

/// DELETE /api/catalog/{table}/{id}
pub async fn delete_item(
    State(deployment): State<DeploymentImpl>,
    Path((table, id)): Path<(String, i64)>,
) -> Result<ResponseJson<ApiResponse<bool>>, ApiError> {
    let table = resolve_table(&table)?;
    let deleted = catalog_admin::delete_item(&deployment.db().pool, table, id).await?;

    if deleted {
        deployment
            .track_if_analytics_allowed(
                "catalog_item_deleted",
                serde_json::json!({ "table": table.name, "id": id }),
            )
            .await;
    }

    Ok(ResponseJson(ApiResponse::success(deleted)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/catalog/{table}",
        Router::new()
            .route("/", get(list_items).post(create_item))
            .route("/{id}", get(get_item).put(update_item).delete(delete_item)),
    )
}
