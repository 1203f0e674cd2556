use crate::{inventory, CloudProvider, InstanceRequest, StackRequest, VolumeRequest};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::client::Waiters as _;
use aws_sdk_cloudformation::types::{Capability, Parameter};
use aws_sdk_ec2::client::Waiters as _;
use aws_sdk_ec2::types::{
    BlockDeviceMapping, EbsBlockDevice, Filter, IamInstanceProfileSpecification, InstanceType,
    ResourceType, TagSpecification, VolumeType,
};
use aws_sdk_ssm::types::CommandInvocationStatus;
use aws_sdk_sts::config::Credentials;
use dremio_common::config::AwsSettings;
use dremio_common::{InstanceDescriptor, Tag, TAG_MANAGED};
use std::time::Duration;
use tokio::time::sleep;

const ROLE_SESSION_NAME: &str = "dremio-aws-edition";
const SHELL_DOCUMENT: &str = "AWS-RunShellScript";
const INSTANCE_RUNNING_MAX_WAIT: Duration = Duration::from_secs(600);
// Re-fetches of a command invocation that is still pending/in progress.
const INVOCATION_POLL_ATTEMPTS: usize = 10;

pub struct AwsProvider {
    region: String,
    cloudformation: aws_sdk_cloudformation::Client,
    ec2: aws_sdk_ec2::Client,
    ssm: aws_sdk_ssm::Client,
    s3: aws_sdk_s3::Client,
    efs: aws_sdk_efs::Client,
}

impl AwsProvider {
    /// Builds one session for the whole run. Static keys from the config win over
    /// the SDK default chain; `role_arn`, when set, is assumed on top of either.
    pub async fn connect(settings: &AwsSettings) -> Result<Self> {
        let region = Region::new(settings.region.clone());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region.clone());
        if let (Some(access), Some(secret)) = (&settings.access_key, &settings.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access.clone(),
                secret.clone(),
                None,
                None,
                "dremio-config",
            ));
        }
        let mut sdk_config = loader.load().await;

        if let Some(role_arn) = settings.role_arn.as_deref() {
            tracing::info!("[AWS STS] Assuming role {}", role_arn);
            let sts = aws_sdk_sts::Client::new(&sdk_config);
            let resp = sts
                .assume_role()
                .role_arn(role_arn)
                .role_session_name(ROLE_SESSION_NAME)
                .send()
                .await
                .with_context(|| format!("AssumeRole failed for {role_arn}"))?;
            let creds = resp
                .credentials()
                .ok_or_else(|| anyhow!("AssumeRole returned no credentials for {role_arn}"))?;
            let assumed = Credentials::new(
                creds.access_key_id(),
                creds.secret_access_key(),
                Some(creds.session_token().to_string()),
                None,
                "dremio-assume-role",
            );
            sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(assumed)
                .load()
                .await;
        }

        Ok(Self::from_sdk_config(&sdk_config, &settings.region))
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig, region: &str) -> Self {
        Self {
            region: region.to_string(),
            cloudformation: aws_sdk_cloudformation::Client::new(sdk_config),
            ec2: aws_sdk_ec2::Client::new(sdk_config),
            ssm: aws_sdk_ssm::Client::new(sdk_config),
            s3: aws_sdk_s3::Client::new(sdk_config),
            efs: aws_sdk_efs::Client::new(sdk_config),
        }
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceDescriptor> {
        let resp = self
            .ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .with_context(|| format!("DescribeInstances failed for {instance_id}"))?;
        resp.reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .map(to_descriptor)
            .ok_or_else(|| anyhow!("Instance {instance_id} not found"))
    }
}

fn to_descriptor(instance: &aws_sdk_ec2::types::Instance) -> InstanceDescriptor {
    InstanceDescriptor {
        instance_id: instance.instance_id().unwrap_or_default().to_string(),
        instance_type: instance.instance_type().map(|t| t.as_str().to_string()),
        public_ip: instance.public_ip_address().map(str::to_string),
        private_ip: instance.private_ip_address().map(str::to_string),
        tags: instance
            .tags()
            .iter()
            .map(|t| Tag::new(t.key().unwrap_or_default(), t.value().unwrap_or_default()))
            .collect(),
    }
}

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

#[async_trait]
impl CloudProvider for AwsProvider {
    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        tracing::info!(
            "[AWS CloudFormation] CreateStack {} from {}",
            request.stack_name,
            request.template_url
        );
        let mut call = self
            .cloudformation
            .create_stack()
            .stack_name(&request.stack_name)
            .template_url(&request.template_url)
            .capabilities(Capability::CapabilityIam);
        for (key, value) in &request.parameters {
            call = call.parameters(
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build(),
            );
        }
        let resp = call
            .send()
            .await
            .with_context(|| format!("CreateStack failed for {}", request.stack_name))?;
        Ok(resp
            .stack_id()
            .map(str::to_string)
            .unwrap_or_else(|| request.stack_name.clone()))
    }

    async fn wait_for_stack(&self, stack_name: &str, max_wait: Duration) -> Result<()> {
        tracing::info!(
            "[AWS CloudFormation] Waiting up to {:?} for {} to complete",
            max_wait,
            stack_name
        );
        self.cloudformation
            .wait_until_stack_create_complete()
            .stack_name(stack_name)
            .wait(max_wait)
            .await
            .with_context(|| format!("Stack {stack_name} did not reach CREATE_COMPLETE"))?;
        tracing::info!("✅ [AWS CloudFormation] Stack {} created", stack_name);
        Ok(())
    }

    async fn stack_outputs(&self, stack_id: &str) -> Result<Vec<inventory::StackOutput>> {
        let resp = self
            .cloudformation
            .describe_stacks()
            .stack_name(stack_id)
            .send()
            .await
            .with_context(|| format!("DescribeStacks failed for {stack_id}"))?;
        let stack = resp
            .stacks()
            .first()
            .ok_or_else(|| anyhow!("Stack {stack_id} not found"))?;
        tracing::debug!("[AWS CloudFormation] {:?}", stack);
        Ok(stack
            .outputs()
            .iter()
            .map(|o| inventory::StackOutput {
                key: o.output_key().unwrap_or_default().to_string(),
                value: o.output_value().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn create_instance(&self, request: &InstanceRequest) -> Result<InstanceDescriptor> {
        tracing::info!(
            "[AWS EC2] RunInstances type={} image={} subnet={}",
            request.instance_type,
            request.image_id,
            request.subnet_id
        );
        let resp = self
            .ec2
            .run_instances()
            .image_id(&request.image_id)
            .subnet_id(&request.subnet_id)
            .min_count(1)
            .max_count(1)
            .instance_type(InstanceType::from(request.instance_type.as_str()))
            .iam_instance_profile(
                IamInstanceProfileSpecification::builder()
                    .arn(&request.iam_instance_profile_arn)
                    .name(&request.iam_instance_profile)
                    .build(),
            )
            .key_name(&request.key_name)
            .block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name(&request.boot_device)
                    .ebs(
                        EbsBlockDevice::builder()
                            .snapshot_id(&request.boot_snapshot_id)
                            .volume_size(request.boot_volume_size_gb)
                            .volume_type(VolumeType::from(request.boot_volume_type.as_str()))
                            .build(),
                    )
                    .build(),
            )
            .send()
            .await
            .context("RunInstances failed")?;

        let instance_id = resp
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .ok_or_else(|| anyhow!("RunInstances returned no instance"))?
            .to_string();
        tracing::info!("[AWS EC2] Launched {}, waiting for running state", instance_id);

        // Addresses are only assigned once the instance is running.
        self.ec2
            .wait_until_instance_running()
            .instance_ids(&instance_id)
            .wait(INSTANCE_RUNNING_MAX_WAIT)
            .await
            .with_context(|| format!("Instance {instance_id} did not reach running state"))?;

        self.describe_instance(&instance_id).await
    }

    async fn list_managed_instances(
        &self,
        vpc_id: &str,
        subnet_id: &str,
    ) -> Result<Vec<InstanceDescriptor>> {
        let resp = self
            .ec2
            .describe_instances()
            .filters(filter("vpc-id", vpc_id))
            .filters(filter("subnet-id", subnet_id))
            .filters(filter(&format!("tag:{TAG_MANAGED}"), "true"))
            .filters(filter("instance-state-name", "running"))
            .send()
            .await
            .context("DescribeInstances failed")?;
        Ok(resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .map(to_descriptor)
            .collect())
    }

    async fn run_command(
        &self,
        instance_id: &str,
        commands: &[String],
        settle: Duration,
    ) -> Result<inventory::CommandOutput> {
        let sent = self
            .ssm
            .send_command()
            .document_name(SHELL_DOCUMENT)
            .parameters("commands", commands.to_vec())
            .instance_ids(instance_id)
            .send()
            .await
            .with_context(|| format!("SendCommand failed for {instance_id}"))?;
        let command_id = sent
            .command()
            .and_then(|c| c.command_id())
            .ok_or_else(|| anyhow!("SendCommand returned no command id"))?
            .to_string();
        tracing::debug!("[AWS SSM] Sent command {} to {}", command_id, instance_id);

        for attempt in 1..=INVOCATION_POLL_ATTEMPTS {
            sleep(settle).await;
            let resp = match self
                .ssm
                .get_command_invocation()
                .command_id(&command_id)
                .instance_id(instance_id)
                .send()
                .await
            {
                Ok(resp) => resp,
                // The invocation is not registered right after SendCommand returns.
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_invocation_does_not_exist()) =>
                {
                    tracing::debug!("[AWS SSM] Invocation {} not visible yet", command_id);
                    continue;
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("GetCommandInvocation failed for {command_id}")))
                }
            };

            let pending = matches!(
                resp.status(),
                Some(
                    CommandInvocationStatus::Pending
                        | CommandInvocationStatus::InProgress
                        | CommandInvocationStatus::Delayed
                )
            );
            if pending && attempt < INVOCATION_POLL_ATTEMPTS {
                continue;
            }
            return Ok(inventory::CommandOutput {
                command_id,
                status: resp
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                stdout: resp.standard_output_content().unwrap_or_default().to_string(),
                stderr: resp.standard_error_content().unwrap_or_default().to_string(),
            });
        }

        Err(anyhow!(
            "Command {command_id} on {instance_id} produced no invocation after {INVOCATION_POLL_ATTEMPTS} attempts"
        ))
    }

    async fn create_bucket(&self, bucket: &str, tags: &[Tag]) -> Result<bool> {
        use aws_sdk_s3::types::{
            BucketLocationConstraint, CreateBucketConfiguration, Tag as S3Tag, Tagging,
        };

        tracing::info!("[AWS S3] CreateBucket {} in {}", bucket, self.region);
        let mut call = self.s3.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint.
        if self.region != "us-east-1" {
            call = call.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        call.send()
            .await
            .with_context(|| format!("CreateBucket failed for {bucket}"))?;

        let tag_set = tags
            .iter()
            .map(|t| S3Tag::builder().key(&t.key).value(&t.value).build())
            .collect::<Result<Vec<_>, _>>()?;
        self.s3
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(Tagging::builder().set_tag_set(Some(tag_set)).build()?)
            .send()
            .await
            .with_context(|| format!("PutBucketTagging failed for {bucket}"))?;
        Ok(true)
    }

    async fn create_volume(&self, request: &VolumeRequest) -> Result<Option<String>> {
        use aws_sdk_ec2::types::Tag as Ec2Tag;

        tracing::info!(
            "[AWS EC2] CreateVolume {}GiB {} in {}",
            request.size_gb,
            request.volume_type,
            request.availability_zone
        );
        let tags = request
            .tags
            .iter()
            .map(|t| Ec2Tag::builder().key(&t.key).value(&t.value).build())
            .collect();
        let resp = self
            .ec2
            .create_volume()
            .availability_zone(&request.availability_zone)
            .size(request.size_gb)
            .volume_type(VolumeType::from(request.volume_type.as_str()))
            .encrypted(request.encrypted)
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Volume)
                    .set_tags(Some(tags))
                    .build(),
            )
            .send()
            .await
            .context("CreateVolume failed")?;
        Ok(resp.volume_id().map(str::to_string))
    }

    async fn create_file_system(&self, tags: &[Tag]) -> Result<Option<String>> {
        use aws_sdk_efs::types::{PerformanceMode, Tag as EfsTag};

        let tags = tags
            .iter()
            .map(|t| EfsTag::builder().key(&t.key).value(&t.value).build())
            .collect::<Result<Vec<_>, _>>()?;
        let resp = self
            .efs
            .create_file_system()
            .creation_token(uuid::Uuid::new_v4().to_string())
            .performance_mode(PerformanceMode::GeneralPurpose)
            .set_tags(Some(tags))
            .send()
            .await
            .context("CreateFileSystem failed")?;
        tracing::info!("[AWS EFS] Created file system {}", resp.file_system_id());
        Ok(Some(resp.file_system_id().to_string()))
    }
}
