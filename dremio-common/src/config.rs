//! Configuration file handling.
//!
//! Operations read a flat INI file and only look at its `[default]` section.
//! Each operation declares the keys it needs; [`ConfigFile::validate`] checks
//! them up front and the typed records below are built from a validated file,
//! so nothing downstream depends on the order keys were listed in.

use ini::{Ini, ParseOption};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_SECTION: &str = "default";
pub const DEFAULT_GATEWAY_PORT: u16 = 9047;

pub const STACK_UPGRADE_KEYS: &[&str] = &[
    "project_id",
    "cf_url",
    "cf_stack_name",
    "instance_type",
    "key_pair_name",
    "vpc_id",
    "subnet_id",
    "region",
    "whitelist",
    "private",
];

pub const INSTANCE_UPGRADE_KEYS: &[&str] = &[
    "project_id",
    "instance_type",
    "key_pair_name",
    "vpc_id",
    "subnet_id",
    "region",
    "private",
    "ami",
    "iam_instance_profile_arn",
    "iam_instance_profile",
];

pub const DESCRIBE_KEYS: &[&str] = &["region", "vpc_id", "subnet_id"];

pub const CUSTOM_PROJECT_KEYS: &[&str] = &[
    "region",
    "availability_zone",
    "host",
    "instance_id",
    "project_name",
    "project_id",
    "bucket_name",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file: {0}")]
    Parse(String),

    #[error("Missing mandatory parameters: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("Invalid value for '{key}': {value:?}")]
    InvalidValue { key: String, value: String },
}

/// The `[default]` section of a config file, keys lowercased.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    values: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let conf = text.parse::<ConfigFile>()?;
        tracing::debug!(
            "Loaded {} key(s) from {}",
            conf.values.len(),
            path.display()
        );
        Ok(conf)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into().to_lowercase(), v.into()))
            .collect();
        Self { values }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Ok iff every key in `required` is present. Missing keys are reported
    /// in the order they were requested.
    pub fn validate(&self, required: &[&str]) -> Result<(), ConfigError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|k| !self.values.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            tracing::warn!("Missing mandatory parameters: {:?}", missing);
            Err(ConfigError::MissingKeys(missing))
        }
    }

    /// Values for `required`, in exactly that order.
    pub fn values(&self, required: &[&str]) -> Result<Vec<String>, ConfigError> {
        self.validate(required)?;
        Ok(required
            .iter()
            .map(|k| self.values[*k].clone())
            .collect())
    }

    pub fn get(&self, key: &str) -> Result<&str, ConfigError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingKeys(vec![key.to_string()]))
    }

    /// Present and non-blank, trimmed.
    pub fn get_optional(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        parse_bool(key, self.get(key)?)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_optional(key) {
            Some(v) => parse_bool(key, v),
            None => Ok(default),
        }
    }

    fn owned(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key).map(|v| v.trim().to_string())
    }
}

impl FromStr for ConfigFile {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        // Values are taken verbatim: no escape sequences, no quote stripping.
        let opt = ParseOption {
            enabled_escape: false,
            enabled_quote: false,
            ..Default::default()
        };
        let ini =
            Ini::load_from_str_opt(text, opt).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let values = ini
            .iter()
            .filter(|(section, _)| {
                section.is_some_and(|s| s.trim().eq_ignore_ascii_case(DEFAULT_SECTION))
            })
            .flat_map(|(_, props)| props.iter())
            .map(|(k, v)| (k.trim().to_lowercase(), v.to_string()))
            .collect();
        Ok(Self { values })
    }
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

// --- Typed records ---

/// How to reach AWS. Static keys and role assumption are both optional; the
/// SDK default chain is used when neither is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub role_arn: Option<String>,
}

impl AwsSettings {
    pub fn from_config(conf: &ConfigFile) -> Result<Self, ConfigError> {
        conf.validate(&["region"])?;
        let access_key = conf.get_optional("access").map(str::to_string);
        let secret_key = conf.get_optional("secret").map(str::to_string);
        if access_key.is_some() != secret_key.is_some() {
            let missing = if access_key.is_some() { "secret" } else { "access" };
            return Err(ConfigError::MissingKeys(vec![missing.to_string()]));
        }
        Ok(Self {
            region: conf.owned("region")?,
            access_key,
            secret_key,
            role_arn: conf.get_optional("role_arn").map(str::to_string),
        })
    }
}

/// Gateway authentication and addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Personal access token sent as a bearer token.
    pub token: Option<String>,
    /// Port of the product API; `None` means "use the host as given".
    pub api_port: Option<u16>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            token: None,
            api_port: Some(DEFAULT_GATEWAY_PORT),
        }
    }
}

impl GatewaySettings {
    pub fn from_config(conf: &ConfigFile) -> Result<Self, ConfigError> {
        let api_port = match conf.get_optional("gateway_port") {
            None => Some(DEFAULT_GATEWAY_PORT),
            Some(v) if v.eq_ignore_ascii_case("none") => None,
            Some(v) => Some(v.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "gateway_port".to_string(),
                value: v.to_string(),
            })?),
        };
        Ok(Self {
            token: conf.get_optional("pat").map(str::to_string),
            api_port,
        })
    }
}

/// Upgrade/deploy through a CloudFormation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDeployConfig {
    pub project_id: String,
    pub template_url: String,
    pub stack_name: String,
    pub instance_type: String,
    pub key_pair_name: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub region: String,
    pub whitelist: String,
    pub private: bool,
}

impl StackDeployConfig {
    pub fn from_config(conf: &ConfigFile) -> Result<Self, ConfigError> {
        conf.validate(STACK_UPGRADE_KEYS)?;
        Ok(Self {
            project_id: conf.owned("project_id")?,
            template_url: conf.owned("cf_url")?,
            stack_name: conf.owned("cf_stack_name")?,
            instance_type: conf.owned("instance_type")?,
            key_pair_name: conf.owned("key_pair_name")?,
            vpc_id: conf.owned("vpc_id")?,
            subnet_id: conf.owned("subnet_id")?,
            region: conf.owned("region")?,
            whitelist: conf.owned("whitelist")?,
            private: conf.get_bool("private")?,
        })
    }
}

/// Upgrade by launching a coordinator instance directly from an AMI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub project_id: String,
    pub instance_type: String,
    pub key_pair_name: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub region: String,
    pub private: bool,
    pub ami: String,
    pub iam_instance_profile_arn: String,
    pub iam_instance_profile: String,
    pub whitelist: Option<String>,
}

impl CoordinatorConfig {
    pub fn from_config(conf: &ConfigFile) -> Result<Self, ConfigError> {
        conf.validate(INSTANCE_UPGRADE_KEYS)?;
        Ok(Self {
            project_id: conf.owned("project_id")?,
            instance_type: conf.owned("instance_type")?,
            key_pair_name: conf.owned("key_pair_name")?,
            vpc_id: conf.owned("vpc_id")?,
            subnet_id: conf.owned("subnet_id")?,
            region: conf.owned("region")?,
            private: conf.get_bool("private")?,
            ami: conf.owned("ami")?,
            iam_instance_profile_arn: conf.owned("iam_instance_profile_arn")?,
            iam_instance_profile: conf.owned("iam_instance_profile")?,
            whitelist: conf.get_optional("whitelist").map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeConfig {
    pub region: String,
    pub vpc_id: String,
    pub subnet_id: String,
}

impl DescribeConfig {
    pub fn from_config(conf: &ConfigFile) -> Result<Self, ConfigError> {
        conf.validate(DESCRIBE_KEYS)?;
        Ok(Self {
            region: conf.owned("region")?,
            vpc_id: conf.owned("vpc_id")?,
            subnet_id: conf.owned("subnet_id")?,
        })
    }
}

/// Custom project creation on an already running gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomProjectConfig {
    pub region: String,
    pub availability_zone: String,
    pub host: String,
    pub instance_id: String,
    pub project_name: String,
    pub project_id: String,
    pub bucket_name: String,
    pub encrypted: bool,
}

impl CustomProjectConfig {
    pub fn from_config(conf: &ConfigFile) -> Result<Self, ConfigError> {
        conf.validate(CUSTOM_PROJECT_KEYS)?;
        Ok(Self {
            region: conf.owned("region")?,
            availability_zone: conf.owned("availability_zone")?,
            host: conf.owned("host")?,
            instance_id: conf.owned("instance_id")?,
            project_name: conf.owned("project_name")?,
            project_id: conf.owned("project_id")?,
            bucket_name: conf.owned("bucket_name")?,
            encrypted: conf.get_bool_or("encrypted", false)?,
        })
    }
}
