//! # Kubernetes Collaborators
//!
//! `kube` backed implementations of the orchestration interfaces the discovery
//! core depends on: pod listing for member selection, secret lookup for the
//! bootstrap user, and the dashboard Service lookup that yields the admin port.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret, Service};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, ListParams};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

use crate::auth::credentials::CredentialStore;
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::types::{ContainerStatus, MemberCandidate};
use crate::discovery::member::PodLister;

/// Name of the dashboard port on the dashboard Service
pub const DASHBOARD_PORT_NAME: &str = "dashboard";

/// Render a label map as a Kubernetes label selector (`k1=v1,k2=v2`)
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// Convert a pod into a member candidate, keeping container status order
pub fn pod_to_candidate(pod: &Pod) -> MemberCandidate {
    let status = pod.status.as_ref();

    MemberCandidate {
        name: pod.name_any(),
        namespace: pod.namespace().unwrap_or_default(),
        address: status.and_then(|s| s.pod_ip.clone()),
        labels: pod.labels().clone(),
        container_statuses: status
            .and_then(|s| s.container_statuses.as_ref())
            .map(|statuses| {
                statuses
                    .iter()
                    .map(|c| ContainerStatus::new(c.name.clone(), c.ready))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Find the admin port on the dashboard Service
///
/// Uses the numeric target port of the port named `port_name`, or the Service
/// port itself when the target port is absent or refers to a named port.
pub fn admin_port_from_service(service: &Service, port_name: &str) -> TopologyResult<u16> {
    let service_name = service.name_any();
    let port = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| {
            ports
                .iter()
                .find(|p| p.name.as_deref() == Some(port_name))
        })
        .ok_or_else(|| {
            TopologyError::config(format!(
                "service {} has no port named {}",
                service_name, port_name
            ))
        })?;

    let number = match &port.target_port {
        Some(IntOrString::Int(target)) => *target,
        _ => port.port,
    };

    u16::try_from(number).map_err(|_| {
        TopologyError::config(format!(
            "service {} port {} is out of range: {}",
            service_name, port_name, number
        ))
    })
}

/// Lists cluster pods through the Kubernetes API
#[derive(Clone)]
pub struct KubePodLister {
    client: kube::Client,
}

impl KubePodLister {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodLister for KubePodLister {
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> TopologyResult<Vec<MemberCandidate>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        let mut list_params = ListParams::default();
        let selector = label_selector(labels);
        if !selector.is_empty() {
            list_params = list_params.labels(&selector);
        }

        let pod_list = pods
            .list(&list_params)
            .await
            .map_err(|e| TopologyError::kubernetes(format!("Failed to list pods: {}", e)))?;

        debug!(
            namespace = %namespace,
            selector = %selector,
            pods = pod_list.items.len(),
            "Listed cluster pods"
        );

        Ok(pod_list.items.iter().map(pod_to_candidate).collect())
    }
}

/// Reads credential blobs from Kubernetes Secrets
#[derive(Clone)]
pub struct KubeSecretStore {
    client: kube::Client,
}

impl KubeSecretStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str, field: &str) -> TopologyResult<Option<Vec<u8>>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        let secret = secrets
            .get_opt(name)
            .await
            .map_err(|e| TopologyError::kubernetes(format!("Failed to get secret {}: {}", name, e)))?;

        Ok(secret
            .and_then(|s| s.data)
            .and_then(|mut data| data.remove(field))
            .map(|bytes| bytes.0))
    }
}

/// Look up the admin port from the named dashboard Service
pub async fn lookup_admin_port(
    client: &kube::Client,
    namespace: &str,
    service_name: &str,
) -> TopologyResult<u16> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service = services.get(service_name).await.map_err(|e| {
        TopologyError::kubernetes(format!("Failed to get service {}: {}", service_name, e))
    })?;
    admin_port_from_service(&service, DASHBOARD_PORT_NAME)
}
