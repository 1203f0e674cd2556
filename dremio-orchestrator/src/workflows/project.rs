use super::Session;
use crate::gateway::{CustomProjectRequest, ProjectStatus};
use anyhow::{anyhow, bail, Context, Result};
use dremio_common::config::CustomProjectConfig;
use dremio_common::{Tag, TAG_MANAGED, TAG_PROJECT_ID, TAG_PROJECT_NAME, TAG_PROJECT_PENDING};
use dremio_providers::VolumeRequest;
use serde::Serialize;

pub const PROJECT_VOLUME_SIZE_GB: i32 = 100;
pub const PROJECT_VOLUME_TYPE: &str = "gp2";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectOutcome {
    pub project_id: serde_json::Value,
    pub bucket: String,
    pub volume_id: String,
    pub file_system_id: String,
    pub status: ProjectStatus,
}

fn storage_tags(project_id: &str) -> Vec<Tag> {
    vec![
        Tag::new(TAG_MANAGED, "true"),
        Tag::new(TAG_PROJECT_ID, project_id),
    ]
}

fn volume_tags(project_id: &str, project_name: &str) -> Vec<Tag> {
    let mut tags = storage_tags(project_id);
    tags.push(Tag::new(TAG_PROJECT_NAME, project_name));
    tags.push(Tag::new(TAG_PROJECT_PENDING, "true"));
    tags
}

/// Creates the project's bucket, EBS volume and EFS file system, registers the
/// project with the gateway and follows its progress.
pub async fn create_custom_project(
    session: &Session<'_>,
    cfg: &CustomProjectConfig,
) -> Result<ProjectOutcome> {
    let provider = session.provider;
    let gateway = session.gateway;

    let created = provider
        .create_bucket(&cfg.bucket_name, &storage_tags(&cfg.project_id))
        .await
        .with_context(|| format!("Failed to create bucket {}", cfg.bucket_name))?;
    if !created {
        bail!("Provider does not support buckets");
    }

    let volume_id = provider
        .create_volume(&VolumeRequest {
            availability_zone: cfg.availability_zone.clone(),
            size_gb: PROJECT_VOLUME_SIZE_GB,
            volume_type: PROJECT_VOLUME_TYPE.to_string(),
            encrypted: cfg.encrypted,
            tags: volume_tags(&cfg.project_id, &cfg.project_name),
        })
        .await?
        .ok_or_else(|| anyhow!("Provider does not support block volumes"))?;

    let file_system_id = provider
        .create_file_system(&storage_tags(&cfg.project_id))
        .await?
        .ok_or_else(|| anyhow!("Provider does not support file systems"))?;
    tracing::info!(
        "Project storage ready: bucket={} volume={} fs={}",
        cfg.bucket_name,
        volume_id,
        file_system_id
    );

    let input = gateway
        .create_project(&cfg.host, &cfg.instance_id)
        .await
        .context("Failed to get project input")?;
    let project_id = input["id"].clone();

    let request = CustomProjectRequest::new(
        &cfg.project_name,
        project_id.clone(),
        &cfg.instance_id,
        &volume_id,
        &file_system_id,
        &cfg.bucket_name,
    );
    gateway
        .create_custom_project(&cfg.host, &cfg.instance_id, &request)
        .await
        .context("Failed to create custom project")?;

    let status = gateway
        .custom_project_status(
            &cfg.host,
            &cfg.instance_id,
            session.pacing.status_attempts,
            session.pacing.status_interval,
        )
        .await?;
    match &status {
        ProjectStatus::Succeeded => tracing::info!("✅ Project was created successfully"),
        ProjectStatus::Failed(e) => tracing::error!("Project failed to create: {}", e),
        ProjectStatus::Pending => tracing::warn!("Project creation has not finished yet"),
    }

    Ok(ProjectOutcome {
        project_id,
        bucket: cfg.bucket_name.clone(),
        volume_id,
        file_system_id,
        status,
    })
}
