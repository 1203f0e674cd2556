use super::Session;
use crate::deployment;
use anyhow::Result;
use dremio_common::config::DescribeConfig;
use dremio_common::EngineDescriptor;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ClusterDescription {
    /// Coordinator instance type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    pub engines: Vec<EngineDescriptor>,
}

pub async fn describe(session: &Session<'_>, cfg: &DescribeConfig) -> Result<ClusterDescription> {
    let mut description = ClusterDescription::default();
    let Some(coordinator) =
        deployment::find_coordinator(session.provider, &cfg.vpc_id, &cfg.subnet_id).await?
    else {
        return Ok(description);
    };

    description.coordinator = coordinator.instance_type.clone();
    match deployment::authentication_method(
        session.provider,
        &coordinator.instance_id,
        &session.pacing,
    )
    .await
    {
        Ok(auth) => description.auth_type = Some(auth),
        Err(e) => tracing::warn!(
            "Could not read auth type from {}: {:#}",
            coordinator.instance_id,
            e
        ),
    }

    let address = coordinator
        .public_ip
        .as_deref()
        .or(coordinator.private_ip.as_deref());
    match address {
        Some(host) => description.engines = session.gateway.list_engines(host).await?,
        None => tracing::warn!("Coordinator {} has no address", coordinator.instance_id),
    }
    Ok(description)
}
