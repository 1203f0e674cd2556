use anyhow::Result;
use async_trait::async_trait;
use dremio_common::{InstanceDescriptor, Tag};
use std::time::Duration;

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Submits an infrastructure template. Returns the provider's stack id.
    async fn create_stack(&self, request: &StackRequest) -> Result<String>;

    /// Blocks until the stack reports create-complete, or fails once `max_wait` elapses
    /// or the stack rolls back.
    async fn wait_for_stack(&self, stack_name: &str, max_wait: Duration) -> Result<()>;

    async fn stack_outputs(&self, stack_id: &str) -> Result<Vec<inventory::StackOutput>>;

    /// Launches exactly one instance and returns it once it is running.
    async fn create_instance(&self, request: &InstanceRequest) -> Result<InstanceDescriptor>;

    /// Running instances in the VPC/subnet carrying `dremio_managed=true`.
    async fn list_managed_instances(
        &self,
        vpc_id: &str,
        subnet_id: &str,
    ) -> Result<Vec<InstanceDescriptor>>;

    /// Runs shell commands on an instance through the provider's remote execution
    /// service. `settle` is the pause before the result is first fetched.
    async fn run_command(
        &self,
        instance_id: &str,
        commands: &[String],
        settle: Duration,
    ) -> Result<inventory::CommandOutput>;

    // Optional: project storage. Defaults let providers without it compile.

    async fn create_bucket(&self, _bucket: &str, _tags: &[Tag]) -> Result<bool> {
        Ok(false)
    }

    async fn create_volume(&self, _request: &VolumeRequest) -> Result<Option<String>> {
        Ok(None)
    }

    async fn create_file_system(&self, _tags: &[Tag]) -> Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_url: String,
    /// (ParameterKey, ParameterValue), sent in this order.
    pub parameters: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceRequest {
    pub image_id: String,
    pub subnet_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub iam_instance_profile_arn: String,
    pub iam_instance_profile: String,
    pub boot_device: String,
    pub boot_snapshot_id: String,
    pub boot_volume_size_gb: i32,
    pub boot_volume_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeRequest {
    pub availability_zone: String,
    pub size_gb: i32,
    pub volume_type: String,
    pub encrypted: bool,
    pub tags: Vec<Tag>,
}

pub mod inventory {
    use serde::Serialize;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub struct StackOutput {
        pub key: String,
        pub value: String,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub struct CommandOutput {
        pub command_id: String,
        pub status: String,
        pub stdout: String,
        pub stderr: String,
    }

    impl CommandOutput {
        pub fn succeeded(&self) -> bool {
            self.status.eq_ignore_ascii_case("success")
        }
    }
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "aws")]
pub mod aws;
