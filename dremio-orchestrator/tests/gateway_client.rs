// Gateway client behaviour against a scripted fake gateway

mod common;

use common::{api_port_client, progress_page, verbatim_client, FakeGateway};
use dremio_orchestrator::gateway::CustomProjectRequest;
use dremio_orchestrator::{GatewayError, ProjectStatus};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn status_poll_stops_at_first_final_success() {
    let (addr, fake) = FakeGateway::new()
        .progress(vec![
            progress_page("false", "false"),
            progress_page("false", "false"),
            progress_page("true", "true"),
            progress_page("true", "true"),
        ])
        .spawn()
        .await;
    let gateway = verbatim_client(None);

    let status = gateway
        .custom_project_status(&addr.to_string(), "i-1", 20, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(status, ProjectStatus::Succeeded);
    let polls = fake.requests_to("/aws/gateway/progress/");
    assert_eq!(polls.len(), 3);
    assert_eq!(polls[0].uri, "/aws/gateway/progress/0?instanceId=i-1");
    assert_eq!(polls[2].uri, "/aws/gateway/progress/2?instanceId=i-1");
}

#[tokio::test]
async fn status_poll_reports_failure_message() {
    let (addr, _fake) = FakeGateway::new()
        .progress(vec![progress_page("false", "false"), progress_page("true", "false")])
        .spawn()
        .await;
    let gateway = verbatim_client(None);

    let status = gateway
        .custom_project_status(&addr.to_string(), "i-1", 20, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(status, ProjectStatus::Failed("EFS mount timed out".into()));
}

#[tokio::test]
async fn status_poll_is_bounded() {
    // every index 404s
    let (addr, fake) = FakeGateway::new().spawn().await;
    let gateway = verbatim_client(None);

    let status = gateway
        .custom_project_status(&addr.to_string(), "i-1", 4, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(status, ProjectStatus::Pending);
    assert_eq!(fake.requests_to("/aws/gateway/progress/").len(), 4);
}

#[tokio::test]
async fn transport_failure_is_not_swallowed() {
    // Bind and drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = verbatim_client(None);
    let err = gateway
        .custom_project_status(&addr.to_string(), "i-1", 3, Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }));
    assert!(!err.is_not_ready());
}

#[tokio::test]
async fn engines_are_projected_one_to_one() {
    let clusters = json!({
        "clusterList": [
            {
                "name": "default",
                "awsProps": { "instanceType": "m5d.8xlarge" },
                "dynamicConfig": { "containerCount": 2 },
                "shutdownInterval": 7200000
            },
            {
                "name": "reflections",
                "awsProps": { "instanceType": "r5d.4xlarge" },
                "dynamicConfig": { "containerCount": 8 },
                "shutdownInterval": 0
            },
            {
                "name": "adhoc",
                "awsProps": { "instanceType": "c5d.18xlarge" },
                "dynamicConfig": { "containerCount": 1 },
                "shutdownInterval": 300000
            }
        ]
    });
    let (addr, fake) = FakeGateway::new().clusters(clusters.clone()).spawn().await;
    // Product API on the fake's port, whatever the host says.
    let gateway = api_port_client(addr.port());

    let engines = gateway.list_engines("127.0.0.1").await.unwrap();
    assert_eq!(engines.len(), 3);
    for (engine, cluster) in engines.iter().zip(clusters["clusterList"].as_array().unwrap()) {
        assert_eq!(engine.name, cluster["name"]);
        assert_eq!(engine.instance_type, cluster["awsProps"]["instanceType"]);
        assert_eq!(engine.size, cluster["dynamicConfig"]["containerCount"]);
        assert_eq!(engine.shutdown_interval, cluster["shutdownInterval"]);
    }
    assert_eq!(
        fake.requests_to("/apiv2/provision/clusters")[0].auth.as_deref(),
        Some("Bearer pat-test")
    );
}

#[tokio::test]
async fn engine_list_without_cluster_list_is_an_error() {
    let (addr, _fake) = FakeGateway::new().clusters(json!({"error": "nope"})).spawn().await;
    let gateway = verbatim_client(None);
    let err = gateway.list_engines(&addr.to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::MissingField {
            field: "clusterList",
            ..
        }
    ));
}

#[tokio::test]
async fn validate_id_needs_a_token() {
    let (addr, _fake) = FakeGateway::new().spawn().await;
    let host = addr.to_string();

    verbatim_client(Some("pat-test")).validate_id(&host).await.unwrap();

    let err = verbatim_client(None).validate_id(&host).await.unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 401, .. }));
    assert!(err.is_not_ready());
}

#[tokio::test]
async fn create_project_calls_explicit_endpoint() {
    let (addr, fake) = FakeGateway::new().spawn().await;
    let gateway = verbatim_client(None);

    let input = gateway.create_project(&addr.to_string(), "i-9").await.unwrap();
    assert_eq!(input["id"], "gw-project-1");
    assert_eq!(
        fake.requests_to("/aws/gateway/projectInput")[0].uri,
        "/aws/gateway/projectInput?instanceId=i-9"
    );
}

#[tokio::test]
async fn custom_project_requires_status_code_200() {
    let (addr, _fake) = FakeGateway::new()
        .custom_project_reply(json!({ "statusCode": 500, "message": "quota" }))
        .spawn()
        .await;
    let gateway = verbatim_client(None);
    let req = CustomProjectRequest::new("p", json!("gw-1"), "i-1", "vol-1", "fs-1", "bkt");

    let err = gateway
        .create_custom_project(&addr.to_string(), "i-1", &req)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected { .. }));
}

#[tokio::test]
async fn falsy_action_reply_is_rejected() {
    let (addr, fake) = FakeGateway::new().action_body("START", json!({})).spawn().await;
    let gateway = verbatim_client(None);
    let host = addr.to_string();

    gateway.stop_project(&host, "p1", "i-1").await.unwrap();
    let err = gateway.start_project(&host, "p1", "i-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected { .. }));
    assert!(!err.is_not_ready());
    assert_eq!(fake.requests_to("/aws/gateway/project/p1/action").len(), 2);
}
