use crate::{inventory, CloudProvider, InstanceRequest, StackRequest, VolumeRequest};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dremio_common::{InstanceDescriptor, Tag};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// In-memory provider for tests and dry runs. Everything it returns is scripted
/// up front; every call is recorded so tests can assert on the sequence.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    stack_outputs: Vec<inventory::StackOutput>,
    stack_fails: bool,
    launch: Option<InstanceDescriptor>,
    instances: Vec<InstanceDescriptor>,
    command_stdout: String,
    no_storage: bool,
    calls: Vec<String>,
    stack_requests: Vec<StackRequest>,
    instance_requests: Vec<InstanceRequest>,
    volume_requests: Vec<VolumeRequest>,
    buckets: Vec<(String, Vec<Tag>)>,
    file_systems: Vec<Vec<Tag>>,
    commands: Vec<(String, Vec<String>)>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_stack_outputs<I, K, V>(self, outputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.state().stack_outputs = outputs
            .into_iter()
            .map(|(k, v)| inventory::StackOutput {
                key: k.into(),
                value: v.into(),
            })
            .collect();
        self
    }

    /// Makes `wait_for_stack` fail as if the stack had rolled back.
    pub fn with_failing_stack(self) -> Self {
        self.state().stack_fails = true;
        self
    }

    /// The instance `create_instance` hands back. Without one, launches fail.
    pub fn with_launch(self, instance: InstanceDescriptor) -> Self {
        self.state().launch = Some(instance);
        self
    }

    pub fn with_instances(self, instances: Vec<InstanceDescriptor>) -> Self {
        self.state().instances = instances;
        self
    }

    pub fn with_command_stdout(self, stdout: impl Into<String>) -> Self {
        self.state().command_stdout = stdout.into();
        self
    }

    /// Storage calls behave like the trait defaults (unsupported).
    pub fn without_storage(self) -> Self {
        self.state().no_storage = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn stack_requests(&self) -> Vec<StackRequest> {
        self.state().stack_requests.clone()
    }

    pub fn instance_requests(&self) -> Vec<InstanceRequest> {
        self.state().instance_requests.clone()
    }

    pub fn volume_requests(&self) -> Vec<VolumeRequest> {
        self.state().volume_requests.clone()
    }

    pub fn buckets(&self) -> Vec<(String, Vec<Tag>)> {
        self.state().buckets.clone()
    }

    pub fn file_systems(&self) -> Vec<Vec<Tag>> {
        self.state().file_systems.clone()
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.state().commands.clone()
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        let mut state = self.state();
        state.calls.push(format!("create_stack:{}", request.stack_name));
        state.stack_requests.push(request.clone());
        Ok(format!("arn:mock:cloudformation:stack/{}", request.stack_name))
    }

    async fn wait_for_stack(&self, stack_name: &str, _max_wait: Duration) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("wait_for_stack:{stack_name}"));
        if state.stack_fails {
            return Err(anyhow!("Stack {stack_name} entered ROLLBACK_COMPLETE"));
        }
        Ok(())
    }

    async fn stack_outputs(&self, stack_id: &str) -> Result<Vec<inventory::StackOutput>> {
        let mut state = self.state();
        state.calls.push(format!("stack_outputs:{stack_id}"));
        Ok(state.stack_outputs.clone())
    }

    async fn create_instance(&self, request: &InstanceRequest) -> Result<InstanceDescriptor> {
        let mut state = self.state();
        state.calls.push(format!("create_instance:{}", request.image_id));
        state.instance_requests.push(request.clone());
        state
            .launch
            .clone()
            .ok_or_else(|| anyhow!("RunInstances returned no instance"))
    }

    async fn list_managed_instances(
        &self,
        vpc_id: &str,
        subnet_id: &str,
    ) -> Result<Vec<InstanceDescriptor>> {
        let mut state = self.state();
        state
            .calls
            .push(format!("list_managed_instances:{vpc_id}/{subnet_id}"));
        Ok(state.instances.clone())
    }

    async fn run_command(
        &self,
        instance_id: &str,
        commands: &[String],
        _settle: Duration,
    ) -> Result<inventory::CommandOutput> {
        let mut state = self.state();
        state.calls.push(format!("run_command:{instance_id}"));
        state
            .commands
            .push((instance_id.to_string(), commands.to_vec()));
        Ok(inventory::CommandOutput {
            command_id: format!("cmd-{}", state.commands.len()),
            status: "Success".to_string(),
            stdout: state.command_stdout.clone(),
            stderr: String::new(),
        })
    }

    async fn create_bucket(&self, bucket: &str, tags: &[Tag]) -> Result<bool> {
        let mut state = self.state();
        state.calls.push(format!("create_bucket:{bucket}"));
        if state.no_storage {
            return Ok(false);
        }
        state.buckets.push((bucket.to_string(), tags.to_vec()));
        Ok(true)
    }

    async fn create_volume(&self, request: &VolumeRequest) -> Result<Option<String>> {
        let mut state = self.state();
        state
            .calls
            .push(format!("create_volume:{}", request.availability_zone));
        if state.no_storage {
            return Ok(None);
        }
        state.volume_requests.push(request.clone());
        Ok(Some(format!("vol-mock{}", state.volume_requests.len())))
    }

    async fn create_file_system(&self, tags: &[Tag]) -> Result<Option<String>> {
        let mut state = self.state();
        state.calls.push("create_file_system".to_string());
        if state.no_storage {
            return Ok(None);
        }
        state.file_systems.push(tags.to_vec());
        Ok(Some(format!("fs-mock{}", state.file_systems.len())))
    }
}
