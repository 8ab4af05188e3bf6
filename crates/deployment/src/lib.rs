use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use serde_json::Value;
use services::services::{intake::IntakeService, recommendations::RecommendationService};
use thiserror::Error;
use tracing::info;

pub mod config;

pub use config::DeploymentConfig;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler needs, shared across requests.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new(config: DeploymentConfig) -> Result<Self, DeploymentError>;

    fn config(&self) -> &DeploymentConfig;

    fn db(&self) -> &DBService;

    fn recommendations(&self) -> &Arc<RecommendationService>;

    fn intake(&self) -> IntakeService {
        IntakeService::new(self.db().clone()).with_recommendations(self.recommendations().clone())
    }

    /// Record a usage event when analytics are enabled. Events go to the log.
    async fn track_if_analytics_allowed(&self, event_name: &str, properties: Value) {
        if self.config().analytics_enabled {
            info!(event = event_name, properties = %properties, "Analytics event");
        }
    }
}
