use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod routes;

pub type DeploymentImpl = local_deployment::LocalDeployment;

/// The full application router with shared state applied.
pub fn app(deployment: DeploymentImpl) -> Router {
    routes::router(&deployment)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}
