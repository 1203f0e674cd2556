//! Provisioning: CloudFormation gateway stacks, bare coordinator instances,
//! coordinator discovery and remote commands.

use crate::gateway::{is_truthy, GatewayClient};
use crate::pacing::Pacing;
use anyhow::{Context, Result};
use dremio_common::config::{CoordinatorConfig, StackDeployConfig};
use dremio_common::{DeploymentResult, InstanceDescriptor, TAG_ROLE};
use dremio_providers::inventory::StackOutput;
use dremio_providers::{CloudProvider, InstanceRequest, StackRequest};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

pub const BOOT_DEVICE: &str = "/dev/xvda";
pub const BOOT_SNAPSHOT_ID: &str = "dremio-coordinator";
pub const BOOT_VOLUME_SIZE_GB: i32 = 50;
pub const BOOT_VOLUME_TYPE: &str = "standard";

pub const AUTH_TYPE_COMMAND: &str =
    "awk -F'\"' '/auth.type:/ {print $2}' /opt/dremio/conf/dremio.conf";

#[derive(Error, Debug)]
pub enum DeploymentError {
    #[error("Stack has no outputs")]
    NoStackOutputs,

    #[error("Stack has no output at index {0}")]
    MissingOutput(usize),

    #[error("Cannot read host and instance id from {0}")]
    MalformedStatusUrl(String),

    #[error("{url} not ready after {waited:?}")]
    ReadinessTimeout { url: String, waited: Duration },

    #[error("Instance {instance_id} has no {kind} address")]
    NoAddress {
        instance_id: String,
        kind: &'static str,
    },
}

pub fn gateway_stack_request(cfg: &StackDeployConfig) -> StackRequest {
    let params = [
        ("DremioGatewayEC2InstanceType", cfg.instance_type.as_str()),
        ("DremioGatewayEC2KeyPair", cfg.key_pair_name.as_str()),
        ("DremioGatewayEC2VPC", cfg.vpc_id.as_str()),
        ("DremioGatewayEC2Subnet", cfg.subnet_id.as_str()),
        ("DremioGatewayEC2IPWhitelist", cfg.whitelist.as_str()),
        ("DremioGatewayEC2InstanceProfile", ""),
        ("DremioGatewayEC2SecurityGroup", ""),
    ];
    StackRequest {
        stack_name: cfg.stack_name.clone(),
        template_url: cfg.template_url.clone(),
        parameters: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// Sorts outputs by key; the private URL is first, the public one second.
pub fn select_status_url(outputs: &[StackOutput], private: bool) -> Result<String, DeploymentError> {
    if outputs.is_empty() {
        return Err(DeploymentError::NoStackOutputs);
    }
    let mut sorted = outputs.to_vec();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));
    let index = if private { 0 } else { 1 };
    sorted
        .get(index)
        .map(|o| o.value.clone())
        .ok_or(DeploymentError::MissingOutput(index))
}

/// `http://<host>/<segment>=<instance id>` → (host, instance id).
pub fn parse_status_url(url: &str) -> Result<(String, String), DeploymentError> {
    let malformed = || DeploymentError::MalformedStatusUrl(url.to_string());
    let parts: Vec<&str> = url.split('/').collect();
    let host = parts.get(2).filter(|h| !h.is_empty()).ok_or_else(malformed)?;
    let instance_id = parts
        .get(3)
        .and_then(|segment| segment.split('=').nth(1))
        .filter(|id| !id.is_empty())
        .ok_or_else(malformed)?;
    Ok((host.to_string(), instance_id.to_string()))
}

/// Polls `url` until it answers 200 with a truthy body. Connection errors count
/// as "not up yet" since the gateway is still booting.
pub async fn wait_until_ready(
    gateway: &GatewayClient,
    url: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<(), DeploymentError> {
    let started = Instant::now();
    loop {
        match gateway.get_json(url).await {
            Ok(body) if is_truthy(&body) => {
                tracing::info!("✅ Dremio deployment is active at {}", url);
                return Ok(());
            }
            Ok(_) => tracing::debug!("{} answered with an empty body", url),
            Err(e) => tracing::debug!("{} not ready: {}", url, e),
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(DeploymentError::ReadinessTimeout {
                url: url.to_string(),
                waited,
            });
        }
        sleep(interval.min(timeout - waited)).await;
    }
}

/// Create-stack-and-wait: template in, reachable gateway out.
pub async fn deploy_stack(
    provider: &dyn CloudProvider,
    gateway: &GatewayClient,
    cfg: &StackDeployConfig,
    pacing: &Pacing,
) -> Result<DeploymentResult> {
    let request = gateway_stack_request(cfg);
    let stack_id = provider
        .create_stack(&request)
        .await
        .with_context(|| format!("Failed to create stack {}", cfg.stack_name))?;
    provider
        .wait_for_stack(&cfg.stack_name, pacing.stack_create_timeout)
        .await?;

    let outputs = provider.stack_outputs(&stack_id).await?;
    tracing::info!("Stack {} outputs: {:?}", stack_id, outputs);
    let status_url = select_status_url(&outputs, cfg.private)?;
    let (host, instance_id) = parse_status_url(&status_url)?;

    wait_until_ready(
        gateway,
        &status_url,
        pacing.readiness_interval,
        pacing.readiness_timeout,
    )
    .await?;

    Ok(DeploymentResult {
        host,
        instance_id,
        status_url: Some(status_url),
    })
}

pub fn coordinator_request(cfg: &CoordinatorConfig) -> InstanceRequest {
    InstanceRequest {
        image_id: cfg.ami.clone(),
        subnet_id: cfg.subnet_id.clone(),
        instance_type: cfg.instance_type.clone(),
        key_name: cfg.key_pair_name.clone(),
        iam_instance_profile_arn: cfg.iam_instance_profile_arn.clone(),
        iam_instance_profile: cfg.iam_instance_profile.clone(),
        boot_device: BOOT_DEVICE.to_string(),
        boot_snapshot_id: BOOT_SNAPSHOT_ID.to_string(),
        boot_volume_size_gb: BOOT_VOLUME_SIZE_GB,
        boot_volume_type: BOOT_VOLUME_TYPE.to_string(),
    }
}

/// Launches a coordinator directly from an AMI.
pub async fn deploy_coordinator(
    provider: &dyn CloudProvider,
    cfg: &CoordinatorConfig,
) -> Result<DeploymentResult> {
    let instance = provider
        .create_instance(&coordinator_request(cfg))
        .await
        .context("Failed to launch coordinator instance")?;
    let host = instance
        .address(cfg.private)
        .ok_or_else(|| DeploymentError::NoAddress {
            instance_id: instance.instance_id.clone(),
            kind: if cfg.private { "private" } else { "public" },
        })?
        .to_string();
    tracing::info!("Coordinator {} reachable at {}", instance.instance_id, host);
    Ok(DeploymentResult {
        host,
        instance_id: instance.instance_id,
        status_url: None,
    })
}

/// First managed instance without a role tag; workers carry `dremio_role`.
pub async fn find_coordinator(
    provider: &dyn CloudProvider,
    vpc_id: &str,
    subnet_id: &str,
) -> Result<Option<InstanceDescriptor>> {
    let instances = provider
        .list_managed_instances(vpc_id, subnet_id)
        .await
        .context("Error finding coordinator")?;
    let coordinator = instances.into_iter().find(|i| !i.has_tag(TAG_ROLE));
    match &coordinator {
        Some(c) => tracing::info!("Found a Dremio coordinator node: {}", c.instance_id),
        None => tracing::info!("No coordinator in {}/{}", vpc_id, subnet_id),
    }
    Ok(coordinator)
}

/// Reads `auth.type` from the coordinator's dremio.conf.
pub async fn authentication_method(
    provider: &dyn CloudProvider,
    coordinator_id: &str,
    pacing: &Pacing,
) -> Result<String> {
    let output = provider
        .run_command(
            coordinator_id,
            &[AUTH_TYPE_COMMAND.to_string()],
            pacing.command_settle,
        )
        .await?;
    if !output.succeeded() {
        anyhow::bail!(
            "Command {} on {} ended with status {}: {}",
            output.command_id,
            coordinator_id,
            output.status,
            output.stderr.trim()
        );
    }
    Ok(output.stdout.replace('\n', ""))
}
