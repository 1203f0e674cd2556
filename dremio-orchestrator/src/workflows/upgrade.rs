use super::Session;
use crate::deployment;
use anyhow::{Context, Result};
use dremio_common::config::{ConfigError, ConfigFile, CoordinatorConfig, StackDeployConfig};
use dremio_common::DeploymentResult;
use tokio::time::sleep;

/// How the new gateway/coordinator gets provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradePlan {
    Stack(StackDeployConfig),
    Instance(CoordinatorConfig),
}

impl UpgradePlan {
    pub fn from_config(use_stack: bool, conf: &ConfigFile) -> Result<Self, ConfigError> {
        if use_stack {
            StackDeployConfig::from_config(conf).map(UpgradePlan::Stack)
        } else {
            CoordinatorConfig::from_config(conf).map(UpgradePlan::Instance)
        }
    }

    pub fn project_id(&self) -> &str {
        match self {
            UpgradePlan::Stack(c) => &c.project_id,
            UpgradePlan::Instance(c) => &c.project_id,
        }
    }
}

/// Provision → validate token → stop project → wait → start project. The first
/// failure aborts; nothing is rolled back.
pub async fn upgrade(session: &Session<'_>, plan: &UpgradePlan) -> Result<DeploymentResult> {
    let target = match plan {
        UpgradePlan::Stack(cfg) => {
            deployment::deploy_stack(session.provider, session.gateway, cfg, &session.pacing)
                .await?
        }
        UpgradePlan::Instance(cfg) => deployment::deploy_coordinator(session.provider, cfg).await?,
    };
    let project_id = plan.project_id();

    if session.gateway.has_token() {
        session
            .gateway
            .validate_id(&target.host)
            .await
            .with_context(|| format!("Gateway on {} rejected the token", target.host))?;
    }

    session
        .gateway
        .stop_project(&target.host, project_id, &target.instance_id)
        .await
        .with_context(|| format!("Failed to stop project {project_id}"))?;

    tracing::info!(
        "Project {} stopped, restarting in {:?}",
        project_id,
        session.pacing.restart_delay
    );
    sleep(session.pacing.restart_delay).await;

    session
        .gateway
        .start_project(&target.host, project_id, &target.instance_id)
        .await
        .with_context(|| format!("Failed to start project {project_id}"))?;

    tracing::info!("✅ Project {} upgraded onto {}", project_id, target.instance_id);
    Ok(target)
}
