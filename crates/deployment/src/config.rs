use std::time::Duration;

use db::DBService;
use serde::Serialize;
use services::services::recommendations::DEFAULT_LIMIT;
use utils::env::{env_bool, env_duration_secs, env_string, env_u16, env_u64};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_RECOMMENDATION_TTL_SECS: u64 = 300;

/// Runtime settings read from the environment (and `.env`, loaded by the
/// binary before this runs).
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub recommendation_ttl: Duration,
    pub recommendation_limit: u32,
    pub analytics_enabled: bool,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: DBService::default_database_url(),
            recommendation_ttl: Duration::from_secs(DEFAULT_RECOMMENDATION_TTL_SECS),
            recommendation_limit: DEFAULT_LIMIT,
            analytics_enabled: false,
        }
    }
}

impl DeploymentConfig {
    pub fn from_env() -> Self {
        let limit = env_u64("RECOMMENDATION_LIMIT", u64::from(DEFAULT_LIMIT)).clamp(1, 20);
        Self {
            host: env_string("HOST", DEFAULT_HOST),
            port: env_u16("PORT", DEFAULT_PORT),
            database_url: env_string("DATABASE_URL", &DBService::default_database_url()),
            recommendation_ttl: env_duration_secs(
                "RECOMMENDATION_TTL_SECS",
                DEFAULT_RECOMMENDATION_TTL_SECS,
            ),
            recommendation_limit: limit as u32,
            analytics_enabled: env_bool("ANALYTICS_ENABLED", false),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
