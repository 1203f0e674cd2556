// Common test utilities: an in-process fake of the product gateway
#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dremio_common::config::GatewaySettings;
use dremio_orchestrator::GatewayClient;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub uri: String,
    pub auth: Option<String>,
    pub body: Value,
}

/// Scripted gateway. Readiness probes fail `ready_after` times before answering;
/// progress index `i` answers with `progress[i]` or 404 past the end.
pub struct FakeGateway {
    pub requests: Mutex<Vec<Recorded>>,
    pub ready_after: AtomicUsize,
    pub action_status: Mutex<Vec<(&'static str, StatusCode)>>,
    pub action_body: Mutex<Vec<(&'static str, Value)>>,
    pub token_accepted: AtomicBool,
    pub progress: Mutex<Vec<Value>>,
    pub clusters: Mutex<Value>,
    pub custom_project_reply: Mutex<Value>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            requests: Mutex::new(vec![]),
            ready_after: AtomicUsize::new(0),
            action_status: Mutex::new(vec![]),
            action_body: Mutex::new(vec![]),
            token_accepted: AtomicBool::new(true),
            progress: Mutex::new(vec![]),
            clusters: Mutex::new(json!({ "clusterList": [] })),
            custom_project_reply: Mutex::new(json!({ "statusCode": 200 })),
        }
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready_after(self, failures: usize) -> Self {
        self.ready_after.store(failures, Ordering::SeqCst);
        self
    }

    /// Answer `action` (START/STOP) with `status` instead of 200.
    pub fn action_status(self, action: &'static str, status: StatusCode) -> Self {
        self.action_status.lock().unwrap().push((action, status));
        self
    }

    /// Answer `action` with 200 and `body` instead of `{"result": action}`.
    pub fn action_body(self, action: &'static str, body: Value) -> Self {
        self.action_body.lock().unwrap().push((action, body));
        self
    }

    /// validateId answers 401 even when a bearer token is sent.
    pub fn reject_token(self) -> Self {
        self.token_accepted.store(false, Ordering::SeqCst);
        self
    }

    pub fn progress(self, pages: Vec<Value>) -> Self {
        *self.progress.lock().unwrap() = pages;
        self
    }

    pub fn clusters(self, clusters: Value) -> Self {
        *self.clusters.lock().unwrap() = clusters;
        self
    }

    pub fn custom_project_reply(self, reply: Value) -> Self {
        *self.custom_project_reply.lock().unwrap() = reply;
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.uri.starts_with(prefix))
            .collect()
    }

    fn record(&self, method: &'static str, uri: &Uri, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(Recorded {
            method,
            uri: uri.to_string(),
            auth,
            body,
        });
    }

    pub async fn spawn(self) -> (SocketAddr, Arc<FakeGateway>) {
        let state = Arc::new(self);
        let app = Router::new()
            .route("/gateway", get(ready))
            .route("/aws/gateway/project/{id}/action", post(action))
            .route("/aws/gateway/validateId", get(validate))
            .route("/apiv2/provision/clusters", get(clusters))
            .route("/aws/gateway/progress/{index}", get(progress))
            .route("/aws/gateway/projectInput", get(project_input))
            .route("/aws/gateway/customProject/", post(custom_project))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }
}

async fn ready(
    State(gw): State<Arc<FakeGateway>>,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    gw.record("GET", &uri, &headers, Value::Null);
    let remaining = gw.ready_after.load(Ordering::SeqCst);
    if remaining > 0 {
        gw.ready_after.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))).into_response();
    }
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

async fn action(
    State(gw): State<Arc<FakeGateway>>,
    Path(_id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let name = body["action"].as_str().unwrap_or_default().to_string();
    gw.record("POST", &uri, &headers, body);
    let status = gw
        .action_status
        .lock()
        .unwrap()
        .iter()
        .find(|(a, _)| *a == name)
        .map(|(_, s)| *s)
        .unwrap_or(StatusCode::OK);
    let body = gw
        .action_body
        .lock()
        .unwrap()
        .iter()
        .find(|(a, _)| *a == name)
        .map(|(_, b)| b.clone())
        .unwrap_or_else(|| json!({ "result": name }));
    (status, Json(body))
}

async fn validate(
    State(gw): State<Arc<FakeGateway>>,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    gw.record("GET", &uri, &headers, Value::Null);
    if headers.get("authorization").is_some() && gw.token_accepted.load(Ordering::SeqCst) {
        (StatusCode::OK, Json(json!({ "valid": true })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "valid": false })))
    }
}

async fn clusters(
    State(gw): State<Arc<FakeGateway>>,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    gw.record("GET", &uri, &headers, Value::Null);
    Json(gw.clusters.lock().unwrap().clone())
}

async fn progress(
    State(gw): State<Arc<FakeGateway>>,
    Path(index): Path<usize>,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    gw.record("GET", &uri, &headers, Value::Null);
    match gw.progress.lock().unwrap().get(index) {
        Some(page) => (StatusCode::OK, Json(page.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

async fn project_input(
    State(gw): State<Arc<FakeGateway>>,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    gw.record("GET", &uri, &headers, Value::Null);
    Json(json!({ "id": "gw-project-1", "name": "" }))
}

async fn custom_project(
    State(gw): State<Arc<FakeGateway>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    gw.record("POST", &uri, &headers, body);
    Json(gw.custom_project_reply.lock().unwrap().clone())
}

/// Gateway client that talks to `host` as given (no API port rewrite).
pub fn verbatim_client(token: Option<&str>) -> GatewayClient {
    GatewayClient::new(&GatewaySettings {
        token: token.map(str::to_string),
        api_port: None,
    })
    .unwrap()
}

/// Gateway client whose product API lives on `port` of whatever host it is given.
pub fn api_port_client(port: u16) -> GatewayClient {
    GatewayClient::new(&GatewaySettings {
        token: Some("pat-test".into()),
        api_port: Some(port),
    })
    .unwrap()
}

pub fn progress_page(is_final: &str, is_success: &str) -> Value {
    json!({
        "data": [
            { "step": "earlier", "isFinal": "false", "isSuccess": "false" },
            { "step": "current", "isFinal": is_final, "isSuccess": is_success, "error": "EFS mount timed out" }
        ]
    })
}
