use anyhow::Context;
use deployment::{Deployment, DeploymentConfig};
use server::{DeploymentImpl, app};
use services::services::quiz_config::quiz;
use tracing::{info, warn};
use utils::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info,tower_http=info,sqlx=warn");

    if let Err(issues) = quiz().validate_graph() {
        for issue in &issues {
            warn!(?issue, "Quiz configuration issue");
        }
        anyhow::bail!("quiz configuration has {} issue(s)", issues.len());
    }

    let config = DeploymentConfig::from_env();
    let address = config.bind_address();
    let deployment = DeploymentImpl::new(config)
        .await
        .context("failed to initialise deployment")?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "Server listening");

    axum::serve(listener, app(deployment))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
