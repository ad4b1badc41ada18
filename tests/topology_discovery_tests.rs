//! # Topology Discovery Integration Tests
//!
//! Runs the full discovery pipeline against in-memory membership and
//! credential sources and a mock admin API.

use emqx_topology::admin::AdminApiClient;
use emqx_topology::auth::StaticCredentialStore;
use emqx_topology::core::retry::RetryPolicy;
use emqx_topology::core::types::ContainerStatus;
use emqx_topology::discovery::StaticPodLister;
use emqx_topology::{
    ClusterRef, MemberCandidate, PortProtocol, PortSpec, TopologyConfig, TopologyDiscovery,
    TopologyError, WarningReason,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLUSTER_LABEL: &str = "apps.emqx.io/instance";

fn member(name: &str, ready: bool) -> MemberCandidate {
    MemberCandidate {
        name: name.to_string(),
        namespace: "default".to_string(),
        address: Some("127.0.0.1".to_string()),
        labels: BTreeMap::from([(CLUSTER_LABEL.to_string(), "emqx".to_string())]),
        container_statuses: vec![ContainerStatus::new("emqx", ready)],
    }
}

fn test_config() -> TopologyConfig {
    let mut config = TopologyConfig::default();
    config.admin.retry = RetryPolicy::none();
    config.admin.request_timeout = Duration::from_secs(2);
    config.discovery.deadline = Duration::from_secs(5);
    config
}

fn discovery(config: TopologyConfig, members: Vec<MemberCandidate>, credentials: StaticCredentialStore) -> TopologyDiscovery {
    let api = Arc::new(AdminApiClient::new(&config.admin).unwrap());
    TopologyDiscovery::new(
        config,
        Arc::new(StaticPodLister::new(members)),
        Arc::new(credentials),
        api,
    )
}

fn bootstrap_secret() -> StaticCredentialStore {
    StaticCredentialStore::new().with_entry("default", "emqx-bootstrap-user", "bootstrap_user", "admin:public")
}

fn cluster(server: &MockServer) -> ClusterRef {
    ClusterRef::new("emqx", "default")
        .with_label(CLUSTER_LABEL, "emqx")
        .with_admin_port(Ok(server.address().port()))
}

async fn mount_json(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_scenario(server: &MockServer) {
    mount_json(
        server,
        "/api/v5/listeners",
        r#"[
            {"enable": true, "id": "tcp:default", "bind": "0.0.0.0:1883", "type": "tcp", "running": true},
            {"enable": false, "id": "ssl:default", "bind": "0.0.0.0:8883", "type": "ssl"}
        ]"#,
    )
    .await;
    mount_json(server, "/api/v5/gateway", r#"[{"name": "mqtt-quic", "status": "running"}]"#).await;
    mount_json(
        server,
        "/api/v5/gateway/mqtt-quic/listeners",
        r#"[{"enable": true, "id": "quic:default", "bind": "0.0.0.0:14567", "type": "quic"}]"#,
    )
    .await;
}

fn expected_ports() -> Vec<PortSpec> {
    vec![
        PortSpec {
            name: "tcp-default".to_string(),
            protocol: PortProtocol::Tcp,
            port: 1883,
            target_port: 1883,
        },
        PortSpec {
            name: "quic-default".to_string(),
            protocol: PortProtocol::Udp,
            port: 14567,
            target_port: 14567,
        },
    ]
}

#[tokio::test]
async fn test_end_to_end_port_discovery() {
    let server = MockServer::start().await;
    mount_scenario(&server).await;

    let discovery = discovery(
        test_config(),
        vec![member("emqx-core-0", false), member("emqx-core-1", true)],
        bootstrap_secret(),
    );

    let outcome = discovery
        .discover_ports(&cluster(&server), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.value, expected_ports());
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn test_missing_secret_degrades_to_anonymous_with_warning() {
    let server = MockServer::start().await;
    Mock::given(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .mount(&server)
        .await;
    mount_scenario(&server).await;

    let discovery = discovery(
        test_config(),
        vec![member("emqx-core-0", true)],
        StaticCredentialStore::new(),
    );

    let outcome = discovery
        .discover_ports(&cluster(&server), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.value, expected_ports());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].reason, WarningReason::FailedToGetBootstrapUser);
}

#[tokio::test]
async fn test_admin_port_lookup_failure_falls_back_with_warning() {
    let server = MockServer::start().await;

    let mut config = test_config();
    config.admin.default_port = server.address().port();
    let discovery = discovery(config, vec![member("emqx-core-0", true)], bootstrap_secret());

    mount_scenario(&server).await;

    let cluster = ClusterRef::new("emqx", "default")
        .with_label(CLUSTER_LABEL, "emqx")
        .with_admin_port(Err("service emqx-dashboard not found".to_string()));

    let outcome = discovery
        .discover_ports(&cluster, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.value, expected_ports());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].reason, WarningReason::FailedToGetAdminPort);
    assert!(outcome.warnings[0]
        .message
        .contains(&format!("use {} port", server.address().port())));
}

#[tokio::test]
async fn test_no_ready_member_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(0)
        .mount(&server)
        .await;

    let discovery = discovery(
        test_config(),
        vec![member("emqx-core-0", false), member("emqx-core-1", false)],
        bootstrap_secret(),
    );

    let err = discovery
        .discover_ports(&cluster(&server), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TopologyError::NoReadyMember { .. }));
}

#[tokio::test]
async fn test_node_discovery() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/api/v5/nodes",
        r#"[{"node": "emqx@10.0.0.1", "node_status": "running", "version": "5.1.0", "max_fds": 1048576}]"#,
    )
    .await;

    let discovery = discovery(test_config(), vec![member("emqx-core-0", true)], bootstrap_secret());
    let outcome = discovery
        .discover_nodes(&cluster(&server), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.value.len(), 1);
    assert_eq!(outcome.value[0].node, "emqx@10.0.0.1");
    assert_eq!(outcome.value[0].version.as_deref(), Some("5.1.0"));
}

#[tokio::test]
async fn test_deadline_bounds_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.discovery.deadline = Duration::from_millis(100);
    let discovery = discovery(config, vec![member("emqx-core-0", true)], bootstrap_secret());

    let err = discovery
        .discover_ports(&cluster(&server), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TopologyError::Timeout { timeout_ms: 100, .. }));
}

#[tokio::test]
async fn test_cancelled_run_returns_cancelled() {
    let server = MockServer::start().await;
    mount_scenario(&server).await;

    let discovery = discovery(test_config(), vec![member("emqx-core-0", true)], bootstrap_secret());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = discovery
        .discover_ports(&cluster(&server), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, TopologyError::Cancelled { .. }));
}

#[tokio::test]
async fn test_cancel_aborts_pending_admin_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.admin.request_timeout = Duration::from_secs(10);
    config.discovery.deadline = Duration::from_secs(10);
    let discovery = discovery(config, vec![member("emqx-core-0", true)], bootstrap_secret());

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = discovery
        .discover_ports(&cluster(&server), &cancel)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, TopologyError::Cancelled { .. }));
    assert!(elapsed < Duration::from_secs(1), "cancel took {elapsed:?}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_concurrent_discoveries_are_coalesced() {
    let server = MockServer::start().await;
    let delayed = |body: &str| {
        ResponseTemplate::new(200)
            .set_body_string(body)
            .set_delay(Duration::from_millis(100))
    };
    Mock::given(method("GET"))
        .and(path("/api/v5/listeners"))
        .respond_with(delayed(
            r#"[{"enable": true, "id": "tcp:default", "bind": "0.0.0.0:1883", "type": "tcp"}]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v5/gateway"))
        .respond_with(delayed("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let discovery = discovery(test_config(), vec![member("emqx-core-0", true)], bootstrap_secret());
    let cluster = cluster(&server);

    let (first, second) = tokio::join!(
        discovery.discover_ports_coalesced(&cluster),
        discovery.discover_ports_coalesced(&cluster),
    );

    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(first.value.len(), 1);
    assert_eq!(first.value[0].name, "tcp-default");
}
