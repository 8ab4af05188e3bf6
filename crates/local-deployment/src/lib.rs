use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentConfig, DeploymentError};
use services::services::recommendations::RecommendationService;
use tracing::info;

/// Single-process deployment backed by a local SQLite file.
#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<DeploymentConfig>,
    db: DBService,
    recommendations: Arc<RecommendationService>,
}

impl LocalDeployment {
    fn assemble(config: DeploymentConfig, db: DBService) -> Self {
        let recommendations = Arc::new(RecommendationService::new(
            config.recommendation_ttl,
            config.recommendation_limit,
        ));
        Self {
            config: Arc::new(config),
            db,
            recommendations,
        }
    }

    /// Deployment over a fresh in-memory database, for tests and demos.
    pub async fn in_memory(config: DeploymentConfig) -> Result<Self, DeploymentError> {
        let db = DBService::new_in_memory().await?;
        Ok(Self::assemble(config, db))
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: DeploymentConfig) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        info!(
            ttl_secs = config.recommendation_ttl.as_secs(),
            limit = config.recommendation_limit,
            analytics = config.analytics_enabled,
            "Local deployment initialised"
        );
        Ok(Self::assemble(config, db))
    }

    fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn recommendations(&self) -> &Arc<RecommendationService> {
        &self.recommendations
    }
}
