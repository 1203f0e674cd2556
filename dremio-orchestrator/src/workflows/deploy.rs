use super::Session;
use crate::deployment;
use anyhow::Result;
use dremio_common::config::StackDeployConfig;
use dremio_common::DeploymentResult;

/// Stands up a gateway stack and waits for it to answer. Projects are left alone.
pub async fn deploy(session: &Session<'_>, cfg: &StackDeployConfig) -> Result<DeploymentResult> {
    tracing::info!("Deploying stack {} in {}", cfg.stack_name, cfg.region);
    deployment::deploy_stack(session.provider, session.gateway, cfg, &session.pacing).await
}
