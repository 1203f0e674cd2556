//! Client for the product's management gateway.
//!
//! Every helper returns an explicit [`GatewayError`]; a non-200 answer is kept
//! apart from a transport failure so pollers can tell "not ready yet" from
//! "broken".

use dremio_common::config::GatewaySettings;
use dremio_common::EngineDescriptor;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{url} rejected the request: {reason}")]
    Rejected { url: String, reason: String },

    #[error("Response from {url} has no '{field}'")]
    MissingField { url: String, field: &'static str },

    #[error("Invalid bearer token")]
    InvalidToken,
}

impl GatewayError {
    /// The gateway answered, just not with a 200.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, GatewayError::Status { .. })
    }
}

/// Project lifecycle actions accepted by the action endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Start,
    Stop,
}

impl ProjectAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectAction::Start => "START",
            ProjectAction::Stop => "STOP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum ProjectStatus {
    Succeeded,
    Failed(String),
    /// No final entry seen within the attempt budget.
    Pending,
}

/// Body posted to the custom project endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomProjectRequest {
    pub name: String,
    pub id: Value,
    pub engine_size: String,
    pub custom_node_count: u32,
    pub enable_auto_backups: String,
    pub engine_node_type: String,
    pub iam_instance_profile: String,
    pub instance_id: String,
    pub disable_public_ip: String,
    pub ebs_volume_id: String,
    pub efs_volume_name: String,
    pub s3_bucket_name: String,
}

impl CustomProjectRequest {
    pub fn new(
        name: &str,
        id: Value,
        instance_id: &str,
        ebs_volume_id: &str,
        efs_volume_name: &str,
        s3_bucket_name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            id,
            engine_size: "SMALL".to_string(),
            custom_node_count: 0,
            enable_auto_backups: "false".to_string(),
            engine_node_type: "STANDARD".to_string(),
            iam_instance_profile: String::new(),
            instance_id: instance_id.to_string(),
            disable_public_ip: "true".to_string(),
            ebs_volume_id: ebs_volume_id.to_string(),
            efs_volume_name: efs_volume_name.to_string(),
            s3_bucket_name: s3_bucket_name.to_string(),
        }
    }
}

pub struct GatewayClient {
    client: Client,
    token: Option<String>,
    api_port: Option<u16>,
}

impl GatewayClient {
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        // Same timeouts as the provider clients.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(GatewayError::Client)?;
        if let Some(token) = &settings.token {
            HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|_| GatewayError::InvalidToken)?;
        }
        Ok(Self {
            client,
            token: settings.token.as_ref().map(|t| t.trim().to_string()),
            api_port: settings.api_port,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            // Checked in new().
            if let Ok(v) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, v);
            }
        }
        headers
    }

    // --- URL templates ---

    pub fn gateway_base(&self, host: &str) -> String {
        format!("http://{host}")
    }

    /// Product API base: the host with its port replaced by the configured API port.
    pub fn api_base(&self, host: &str) -> String {
        match self.api_port {
            Some(port) => format!("http://{}:{}", strip_port(host), port),
            None => format!("http://{host}"),
        }
    }

    pub fn action_url(&self, host: &str, project_id: &str) -> String {
        format!(
            "{}/aws/gateway/project/{}/action",
            self.gateway_base(host),
            project_id
        )
    }

    pub fn validate_url(&self, host: &str) -> String {
        format!("{}/aws/gateway/validateId", self.gateway_base(host))
    }

    pub fn engines_url(&self, host: &str) -> String {
        format!("{}/apiv2/provision/clusters", self.api_base(host))
    }

    pub fn project_input_url(&self, host: &str, instance_id: &str) -> String {
        format!(
            "{}/aws/gateway/projectInput?instanceId={}",
            self.api_base(host),
            instance_id
        )
    }

    pub fn custom_project_url(&self, host: &str, instance_id: &str) -> String {
        format!(
            "{}/aws/gateway/customProject/?instanceId={}",
            self.api_base(host),
            instance_id
        )
    }

    pub fn custom_project_status_url(&self, host: &str, index: usize, instance_id: &str) -> String {
        format!(
            "{}/aws/gateway/progress/{}?instanceId={}",
            self.api_base(host),
            index,
            instance_id
        )
    }

    // --- Raw helpers ---

    pub async fn get_json(&self, url: &str) -> Result<Value, GatewayError> {
        tracing::debug!("[Gateway] GET {}", url);
        let resp = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.to_string(),
                source,
            })?;
        read_json(url, resp).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Value, GatewayError> {
        tracing::debug!("[Gateway] POST {}", url);
        let resp = self
            .client
            .post(url)
            .headers(self.headers())
            .json(body)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.to_string(),
                source,
            })?;
        read_json(url, resp).await
    }

    // --- Operations ---

    pub async fn project_action(
        &self,
        host: &str,
        project_id: &str,
        instance_id: &str,
        action: ProjectAction,
    ) -> Result<(), GatewayError> {
        let url = self.action_url(host, project_id);
        let body = json!({
            "action": action.as_str(),
            "id": project_id,
            "instanceId": instance_id,
        });
        tracing::info!("[Gateway] {} project {} on {}", action.as_str(), project_id, host);
        let resp = self.post_json(&url, &body).await?;
        if !is_truthy(&resp) {
            return Err(GatewayError::Rejected {
                url,
                reason: format!("empty response to {}", action.as_str()),
            });
        }
        Ok(())
    }

    pub async fn start_project(
        &self,
        host: &str,
        project_id: &str,
        instance_id: &str,
    ) -> Result<(), GatewayError> {
        self.project_action(host, project_id, instance_id, ProjectAction::Start)
            .await
    }

    pub async fn stop_project(
        &self,
        host: &str,
        project_id: &str,
        instance_id: &str,
    ) -> Result<(), GatewayError> {
        self.project_action(host, project_id, instance_id, ProjectAction::Stop)
            .await
    }

    /// Checks the configured token against the gateway.
    pub async fn validate_id(&self, host: &str) -> Result<(), GatewayError> {
        let url = self.validate_url(host);
        let resp = self.get_json(&url).await?;
        if is_truthy(&resp) {
            Ok(())
        } else {
            Err(GatewayError::Rejected {
                url,
                reason: "token not accepted".to_string(),
            })
        }
    }

    pub async fn list_engines(&self, host: &str) -> Result<Vec<EngineDescriptor>, GatewayError> {
        let url = self.engines_url(host);
        let resp = self.get_json(&url).await?;
        let clusters = resp["clusterList"]
            .as_array()
            .ok_or(GatewayError::MissingField {
                url,
                field: "clusterList",
            })?;
        Ok(clusters.iter().map(EngineDescriptor::from_cluster).collect())
    }

    /// Asks the gateway for a new project input. The body carries the project `id`.
    pub async fn create_project(&self, host: &str, instance_id: &str) -> Result<Value, GatewayError> {
        let url = self.project_input_url(host, instance_id);
        let resp = self.get_json(&url).await?;
        if resp.get("id").map_or(true, Value::is_null) {
            return Err(GatewayError::MissingField { url, field: "id" });
        }
        Ok(resp)
    }

    pub async fn create_custom_project(
        &self,
        host: &str,
        instance_id: &str,
        request: &CustomProjectRequest,
    ) -> Result<Value, GatewayError> {
        let url = self.custom_project_url(host, instance_id);
        let resp = self.post_json(&url, request).await?;
        let code = match &resp["statusCode"] {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        if code != Some(200) {
            return Err(GatewayError::Rejected {
                url,
                reason: format!("statusCode={}", resp["statusCode"]),
            });
        }
        Ok(resp)
    }

    /// Walks the indexed progress endpoint until the last entry is final, or
    /// `attempts` indices have been tried.
    pub async fn custom_project_status(
        &self,
        host: &str,
        instance_id: &str,
        attempts: usize,
        interval: Duration,
    ) -> Result<ProjectStatus, GatewayError> {
        for index in 0..attempts {
            if index > 0 {
                sleep(interval).await;
            }
            let url = self.custom_project_status_url(host, index, instance_id);
            let body = match self.get_json(&url).await {
                Ok(body) => body,
                Err(e) if e.is_not_ready() => {
                    tracing::debug!("[Gateway] No progress yet at {}: {}", url, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(status) = status_from_progress(&body) {
                tracing::info!("[Gateway] Project progress final after {} call(s)", index + 1);
                return Ok(status);
            }
        }
        tracing::warn!("[Gateway] Project still pending after {} attempt(s)", attempts);
        Ok(ProjectStatus::Pending)
    }
}

async fn read_json(url: &str, resp: reqwest::Response) -> Result<Value, GatewayError> {
    let status = resp.status();
    if status != StatusCode::OK {
        let text = resp.text().await.unwrap_or_default();
        tracing::warn!("[Gateway] {} failed: status={}, response={}", url, status, text);
        return Err(GatewayError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let text = resp.text().await.map_err(|source| GatewayError::Transport {
        url: url.to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|source| GatewayError::Decode {
        url: url.to_string(),
        source,
    })
}

/// `host` or `host:port` → `host`. Bracketed IPv6 literals keep their brackets.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.rsplit_once(':') {
        Some((h, port)) if !h.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}

/// JSON truthiness: null, false, 0, and empty strings/arrays/objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Final status carried by the last `data` entry of a progress body, if any.
pub fn status_from_progress(body: &Value) -> Option<ProjectStatus> {
    let last = body["data"].as_array()?.last()?;
    match (flag(&last["isFinal"]), flag(&last["isSuccess"])) {
        (Some(true), Some(true)) => Some(ProjectStatus::Succeeded),
        (Some(true), Some(false)) => {
            let error = match &last["error"] {
                Value::String(s) => s.clone(),
                Value::Null => "unknown error".to_string(),
                other => other.to_string(),
            };
            Some(ProjectStatus::Failed(error))
        }
        _ => None,
    }
}
