use axum::{Router, response::Json as ResponseJson, routing::get};
use utils::response::ApiResponse;

use crate::DeploymentImpl;

pub mod catalog;
pub mod dashboard;
pub mod intake;
pub mod profiles;
pub mod recommendations;

pub async fn health_check() -> ResponseJson<ApiResponse<String>> {
    ResponseJson(ApiResponse::success("ok".to_string()))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let api = Router::new()
        .route("/health", get(health_check))
        .merge(intake::router(deployment))
        .merge(profiles::router(deployment))
        .merge(catalog::router(deployment))
        .merge(recommendations::router(deployment))
        .merge(dashboard::router(deployment));

    Router::new().nest("/api", api)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use deployment::DeploymentConfig;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{DeploymentImpl, app};

    async fn test_app() -> Router {
        let deployment = DeploymentImpl::in_memory(DeploymentConfig::default())
            .await
            .unwrap();
        app(deployment)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(
            app,
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let app = test_app().await;
        let (status, body) = get(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "ok");
    }

    #[tokio::test]
    async fn test_catalog_lists_with_filters_and_rejects_unknown_fields() {
        let app = test_app().await;

        let (status, body) =
            get(&app, "/api/catalog/heat_pumps?limit=2&page=1&pump_type=lucht-water&sort=price&dir=desc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["total"], 3);
        assert_eq!(body["data"]["pagination"]["total_pages"], 2);
        assert_eq!(body["data"]["items"][0]["brand"], "Daikin");
        assert_eq!(body["data"]["filters"]["price"]["kind"], "range");

        let (status, body) = get(&app, "/api/catalog/heat_pumps?colour=red").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = get(&app, "/api/catalog/boats").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_catalog_admin_round_trip() {
        let app = test_app().await;
        let (status, created) = post(
            &app,
            "/api/catalog/inverters",
            json!({ "brand": "Fronius", "model": "Primo GEN24 5.0", "phases": 1, "price": "€1.649" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["data"]["price"], 1649.0);
        let id = created["data"]["id"].as_i64().unwrap();

        let (_, fetched) = get(&app, &format!("/api/catalog/inverters/{id}")).await;
        assert_eq!(fetched["data"]["brand"], "Fronius");

        let (status, deleted) = send(
            &app,
            Request::delete(format!("/api/catalog/inverters/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["data"], true);

        let (_, missing) = get(&app, &format!("/api/catalog/inverters/{id}")).await;
        assert!(missing["data"].is_null());
    }

    #[tokio::test]
    async fn test_next_step_follows_discipline_order_and_validates_answers() {
        let app = test_app().await;

        let (status, body) = post(
            &app,
            "/api/intake/next-step",
            json!({
                "current_step": "disciplines",
                "responses": { "budget_range": "under_10k" },
                "disciplines": ["battery", "pv"]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["next_step"], "pv_roof_orientation");

        let (status, body) = post(
            &app,
            "/api/intake/next-step",
            json!({ "current_step": "postcode", "value": "not a postcode" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);

        let (status, _) = post(
            &app,
            "/api/intake/next-step",
            json!({ "current_step": "nope" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_completed_intake_feeds_recommendations() {
        let app = test_app().await;
        let session_id = Uuid::new_v4();

        let (status, _) = post(
            &app,
            "/api/intake/save",
            json!({
                "session_id": session_id,
                "responses": { "budget_range": "under_10k" },
                "current_step": "disciplines",
                "disciplines": ["wp"]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, completed) = post(
            &app,
            "/api/intake/complete",
            json!({
                "session_id": session_id,
                "responses": { "budget_range": "under_10k", "wp": { "current_heating": "gas_boiler" } },
                "disciplines": ["wp"]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(completed["data"]["normalized_profile"]["budget"]["max"], 10_000.0);
        let profile_id = completed["data"]["profile_id"].as_str().unwrap().to_string();

        let (_, session) = get(&app, &format!("/api/intake/sessions/{session_id}")).await;
        assert_eq!(session["data"]["completed"], true);

        let (_, profile) = get(&app, &format!("/api/profiles/{profile_id}")).await;
        assert_eq!(profile["data"]["disciplines"], json!(["wp"]));

        let uri = format!("/api/recommendations/wp?profile_id={profile_id}");
        let (status, first) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["cached"], false);
        assert_eq!(first["data"]["items"].as_array().unwrap().len(), 3);
        assert_eq!(first["data"]["items"][0]["title"], "Vaillant aroTHERM plus 7");

        let (_, second) = get(&app, &uri).await;
        assert_eq!(second["data"]["cached"], true);

        let (_, refreshed) = get(&app, &format!("{uri}&refresh=true")).await;
        assert_eq!(refreshed["data"]["cached"], false);

        let (status, _) = get(&app, &format!("/api/recommendations/boiler?profile_id={profile_id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(
            &app,
            &format!("/api/recommendations/wp?profile_id={}", Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_layout_defaults_then_persists() {
        let app = test_app().await;

        let (_, default) = get(&app, "/api/dashboard/layout?user_id=u1").await;
        assert_eq!(default["data"]["widget_order"].as_array().unwrap().len(), 6);
        assert!(default["data"]["updated_at"].is_null());

        let (status, saved) = post(
            &app,
            "/api/dashboard/layout",
            json!({
                "user_id": "u1",
                "widget_order": ["recommendations-pv", "profile-summary"],
                "visible_widgets": ["recommendations-pv"]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["data"]["widget_order"][0], "recommendations-pv");

        let (_, reloaded) = get(&app, "/api/dashboard/layout?user_id=u1").await;
        assert_eq!(reloaded["data"]["visible_widgets"], json!(["recommendations-pv"]));

        let (status, _) = post(
            &app,
            "/api/dashboard/layout",
            json!({
                "user_id": "u1",
                "widget_order": ["profile-summary", "profile-summary"],
                "visible_widgets": []
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
