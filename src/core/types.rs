//! # Core Types Module
//!
//! Data records exchanged between the discovery components. Every value here is
//! created fresh for one discovery run and dropped once folded into the
//! returned port list; nothing is cached between runs.
//!
//! The admin API records (`Gateway`, `Listener`, `NodeStatus`) decode strictly:
//! a missing required field is an error rather than a silent default. Extra
//! fields the broker adds are ignored so newer brokers still decode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status value a gateway reports when its listeners are live
pub const GATEWAY_RUNNING: &str = "running";

/// One orchestration-layer pod that may front the broker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberCandidate {
    /// Pod name
    pub name: String,
    /// Pod namespace
    pub namespace: String,
    /// Pod IP, absent until the pod is scheduled and networked
    pub address: Option<String>,
    /// Pod labels
    pub labels: BTreeMap<String, String>,
    /// Container statuses in the order the orchestration layer reports them
    pub container_statuses: Vec<ContainerStatus>,
}

impl MemberCandidate {
    /// Whether a container with the given name reports ready
    pub fn has_ready_container(&self, container_name: &str) -> bool {
        self.container_statuses
            .iter()
            .any(|status| status.name == container_name && status.ready)
    }
}

/// Readiness of one container inside a candidate pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub name: String,
    pub ready: bool,
}

impl ContainerStatus {
    pub fn new<S: Into<String>>(name: S, ready: bool) -> Self {
        Self {
            name: name.into(),
            ready,
        }
    }
}

/// A protocol gateway as listed by `api/v5/gateway`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub name: String,
    pub status: String,
}

impl Gateway {
    /// Whether the gateway is running; the comparison ignores case
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case(GATEWAY_RUNNING)
    }

    /// Admin path listing this gateway's listeners
    pub fn listeners_path(&self) -> String {
        format!(
            "api/v5/gateway/{}/listeners",
            urlencoding::encode(&self.name)
        )
    }
}

/// An enabled or disabled network listener of the broker or of a gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    #[serde(rename = "enable")]
    pub enabled: bool,
    pub id: String,
    pub bind: String,
    #[serde(rename = "type")]
    pub listener_type: String,
}

/// One broker node as reported by `api/v5/nodes`
///
/// Only `node` and `node_status` are required. The remaining documented fields
/// are typed when present and anything else is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node: String,
    pub node_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Transport protocol of an exposed port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl PortProtocol {
    /// Protocol name as the Kubernetes API spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "TCP",
            PortProtocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network port to expose, derived from an enabled listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub name: String,
    pub protocol: PortProtocol,
    pub port: u16,
    pub target_port: u16,
}

impl PortSpec {
    /// Convert into the service port shape the service reconciler consumes
    pub fn to_service_port(&self) -> k8s_openapi::api::core::v1::ServicePort {
        use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

        k8s_openapi::api::core::v1::ServicePort {
            name: Some(self.name.clone()),
            protocol: Some(self.protocol.as_str().to_string()),
            port: i32::from(self.port),
            target_port: Some(IntOrString::Int(i32::from(self.target_port))),
            ..Default::default()
        }
    }
}

/// Why a non-fatal warning was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningReason {
    /// The bootstrap user could not be read; discovery continues unauthenticated
    FailedToGetBootstrapUser,
    /// The admin port could not be determined; the default port is used
    FailedToGetAdminPort,
    /// A listener with an unusable bind address was left out of the port list
    SkippedListener,
}

impl WarningReason {
    /// Event reason string, suitable for a Kubernetes event
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningReason::FailedToGetBootstrapUser => "FailedToGetBootStrapUserSecret",
            WarningReason::FailedToGetAdminPort => "FailedToGetDashboardServicePort",
            WarningReason::SkippedListener => "SkippedListener",
        }
    }
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem that did not stop discovery but that an operator should see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWarning {
    pub reason: WarningReason,
    pub message: String,
}

impl DiscoveryWarning {
    pub fn new<S: Into<String>>(reason: WarningReason, message: S) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// A value together with the non-fatal warnings raised while producing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<DiscoveryWarning>,
}

impl<T> Outcome<T> {
    /// A value with no warnings
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// A value with a single warning
    pub fn warned(value: T, warning: DiscoveryWarning) -> Self {
        Self {
            value,
            warnings: vec![warning],
        }
    }

    /// Move this outcome's warnings into `sink` and return the bare value
    pub fn drain_into(self, sink: &mut Vec<DiscoveryWarning>) -> T {
        sink.extend(self.warnings);
        self.value
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Identifies the broker cluster a discovery run targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    /// Cluster resource name; also the base of the bootstrap secret name
    pub name: String,
    /// Namespace the cluster's pods live in
    pub namespace: String,
    /// Labels selecting the cluster's pods
    pub labels: BTreeMap<String, String>,
    /// Admin port as determined by the caller, or why it could not be
    pub admin_port: Option<Result<u16, String>>,
}

impl ClusterRef {
    pub fn new<N: Into<String>, S: Into<String>>(name: N, namespace: S) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            admin_port: None,
        }
    }

    pub fn with_label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_admin_port(mut self, port: Result<u16, String>) -> Self {
        self.admin_port = Some(port);
        self
    }

    /// Key used to coalesce concurrent discoveries of the same cluster
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_running_ignores_case() {
        let gateway = |status: &str| Gateway {
            name: "mqttsn".to_string(),
            status: status.to_string(),
        };
        assert!(gateway("running").is_running());
        assert!(gateway("RUNNING").is_running());
        assert!(gateway("Running").is_running());
        assert!(!gateway("stopped").is_running());
        assert!(!gateway("unloaded").is_running());
    }

    #[test]
    fn test_gateway_listeners_path_encodes_name() {
        let gateway = Gateway {
            name: "mqtt sn".to_string(),
            status: "running".to_string(),
        };
        assert_eq!(gateway.listeners_path(), "api/v5/gateway/mqtt%20sn/listeners");
    }

    #[test]
    fn test_listener_requires_all_fields() {
        let ok: Result<Listener, _> = serde_json::from_str(
            r#"{"enable": true, "id": "tcp:default", "bind": "0.0.0.0:1883", "type": "tcp", "running": true}"#,
        );
        let listener = ok.unwrap();
        assert!(listener.enabled);
        assert_eq!(listener.listener_type, "tcp");

        let missing: Result<Listener, _> =
            serde_json::from_str(r#"{"enable": true, "id": "tcp:default", "type": "tcp"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_node_status_keeps_unknown_fields() {
        let node: NodeStatus = serde_json::from_str(
            r#"{"node": "emqx@10.0.0.1", "node_status": "running", "version": "5.1.0", "sys_path": "/opt/emqx"}"#,
        )
        .unwrap();
        assert_eq!(node.version.as_deref(), Some("5.1.0"));
        assert_eq!(
            node.extra.get("sys_path"),
            Some(&serde_json::Value::String("/opt/emqx".to_string()))
        );
    }

    #[test]
    fn test_port_spec_to_service_port() {
        let spec = PortSpec {
            name: "quic-default".to_string(),
            protocol: PortProtocol::Udp,
            port: 14567,
            target_port: 14567,
        };
        let service_port = spec.to_service_port();
        assert_eq!(service_port.name.as_deref(), Some("quic-default"));
        assert_eq!(service_port.protocol.as_deref(), Some("UDP"));
        assert_eq!(service_port.port, 14567);
    }

    #[test]
    fn test_outcome_drain_into() {
        let mut sink = Vec::new();
        let outcome = Outcome::warned(
            5u16,
            DiscoveryWarning::new(WarningReason::FailedToGetAdminPort, "fallback"),
        );
        assert_eq!(outcome.drain_into(&mut sink), 5);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].reason.as_str(), "FailedToGetDashboardServicePort");
    }

    #[test]
    fn test_member_ready_container() {
        let member = MemberCandidate {
            name: "emqx-core-0".to_string(),
            container_statuses: vec![
                ContainerStatus::new("sidecar", true),
                ContainerStatus::new("emqx", false),
            ],
            ..Default::default()
        };
        assert!(!member.has_ready_container("emqx"));
        assert!(member.has_ready_container("sidecar"));
    }
}
