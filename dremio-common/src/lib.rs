use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod config;

pub use config::{ConfigError, ConfigFile};

// --- Tag keys written and read on AWS resources ---

pub const TAG_MANAGED: &str = "dremio_managed";
pub const TAG_ROLE: &str = "dremio_role";
pub const TAG_PROJECT_ID: &str = "dremio_project_id";
pub const TAG_PROJECT_NAME: &str = "dremio_project_name";
pub const TAG_PROJECT_PENDING: &str = "dremio_project_pending";

// --- Entities ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Where a freshly provisioned gateway/coordinator can be reached.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub host: String,
    pub instance_id: String,
    pub status_url: Option<String>,
}

/// Subset of EC2 instance metadata the workflows care about.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct InstanceDescriptor {
    pub instance_id: String,
    pub instance_type: Option<String>,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub tags: Vec<Tag>,
}

impl InstanceDescriptor {
    /// Private or public address, depending on how the cluster is reached.
    pub fn address(&self, private: bool) -> Option<&str> {
        if private {
            self.private_ip.as_deref()
        } else {
            self.public_ip.as_deref()
        }
    }

    pub fn has_tag(&self, key: &str) -> bool {
        search_tags(&self.tags, key)
    }
}

/// Engine as reported by the gateway's cluster list. Values are copied as-is.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EngineDescriptor {
    pub name: Value,
    #[serde(rename = "instanceType")]
    pub instance_type: Value,
    pub size: Value,
    #[serde(rename = "shutdownInterval")]
    pub shutdown_interval: Value,
}

impl EngineDescriptor {
    /// Projects one `clusterList` entry. Missing fields come through as `null`.
    pub fn from_cluster(cluster: &Value) -> Self {
        Self {
            name: cluster["name"].clone(),
            instance_type: cluster["awsProps"]["instanceType"].clone(),
            size: cluster["dynamicConfig"]["containerCount"].clone(),
            shutdown_interval: cluster["shutdownInterval"].clone(),
        }
    }
}

/// True iff `key` is exactly one of the tag keys.
pub fn search_tags(tags: &[Tag], key: &str) -> bool {
    tags.iter().any(|t| t.key == key)
}
