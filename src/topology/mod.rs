//! # Topology Discovery
//!
//! Composes the discovery pipeline for one cluster:
//!
//! 1. resolve the bootstrap credential (degrades to anonymous with a warning)
//! 2. resolve the admin port (falls back to the default with a warning)
//! 3. select the first ready member
//! 4. query node statuses or listeners through the member's admin API
//! 5. map listeners to service ports
//!
//! Each run is one unit of work bound to the configured deadline and to the
//! caller's cancellation token. Cancelling or dropping a run drops the
//! in-flight HTTP request with it. Nothing is carried over between runs.

pub mod inflight;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::admin::client::{AdminApi, AdminApiClient};
use crate::admin::endpoints::AdminSession;
use crate::auth::credentials::{CredentialResolver, CredentialStore};
use crate::core::config::TopologyConfig;
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::types::{
    ClusterRef, DiscoveryWarning, NodeStatus, Outcome, PortSpec, WarningReason,
};
use crate::discovery::member::{MemberSelector, PodLister};
use crate::observability::metrics::record_discovery;
use crate::ports::map_listeners;

pub use inflight::InFlight;

/// Result of a port discovery, shared between coalesced callers
pub type PortDiscovery = TopologyResult<Outcome<Vec<PortSpec>>>;

/// Use the looked-up admin port, or fall back to `default_port` with a warning
///
/// Never fails: an unknown port is not a reason to abandon discovery.
pub fn resolve_admin_port(lookup: Option<Result<u16, String>>, default_port: u16) -> Outcome<u16> {
    let reason = match lookup {
        Some(Ok(port)) => return Outcome::clean(port),
        Some(Err(reason)) => reason,
        None => "admin port was not provided".to_string(),
    };

    let message = format!(
        "Failed to get dashboard service port: {}, use {} port",
        reason, default_port
    );
    warn!(default_port, reason = %reason, "Falling back to default admin port");
    Outcome::warned(
        default_port,
        DiscoveryWarning::new(WarningReason::FailedToGetAdminPort, message),
    )
}

/// Discovers the run-time topology of broker clusters
#[derive(Clone)]
pub struct TopologyDiscovery {
    config: Arc<TopologyConfig>,
    selector: MemberSelector,
    credentials: Arc<dyn CredentialStore>,
    api: Arc<dyn AdminApi>,
    in_flight: Arc<InFlight<PortDiscovery>>,
}

impl TopologyDiscovery {
    /// Wire the discovery service from its collaborators
    pub fn new(
        config: TopologyConfig,
        pods: Arc<dyn PodLister>,
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn AdminApi>,
    ) -> Self {
        let selector = MemberSelector::new(pods, config.discovery.container_name.clone());
        Self {
            config: Arc::new(config),
            selector,
            credentials,
            api,
            in_flight: Arc::new(InFlight::new()),
        }
    }

    /// Wire the discovery service with the `reqwest` admin client
    pub fn with_http_client(
        config: TopologyConfig,
        pods: Arc<dyn PodLister>,
        credentials: Arc<dyn CredentialStore>,
    ) -> TopologyResult<Self> {
        let api = Arc::new(AdminApiClient::new(&config.admin)?);
        Ok(Self::new(config, pods, credentials, api))
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Credential, port and member for one run, with the warnings raised on the way
    async fn open_session(&self, cluster: &ClusterRef) -> TopologyResult<Outcome<AdminSession>> {
        let mut warnings = Vec::new();

        let resolver = CredentialResolver::new(
            cluster.namespace.clone(),
            self.config.discovery.secret_name(&cluster.name),
            self.config.discovery.credential_field.clone(),
        );
        let credential = resolver
            .resolve_from_store(self.credentials.as_ref())
            .await
            .drain_into(&mut warnings);

        let port = resolve_admin_port(cluster.admin_port.clone(), self.config.admin.default_port)
            .drain_into(&mut warnings);

        let member = self.selector.select(&cluster.namespace, &cluster.labels).await?;

        Ok(Outcome {
            value: AdminSession::new(Arc::clone(&self.api), member, credential, port),
            warnings,
        })
    }

    /// Bind `work` to the configured deadline and the caller's cancellation token
    async fn bounded<T, F>(&self, operation: &str, cancel: &CancellationToken, work: F) -> TopologyResult<T>
    where
        F: Future<Output = TopologyResult<T>>,
    {
        let deadline = self.config.discovery.deadline;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TopologyError::cancelled(operation)),
            result = tokio::time::timeout(deadline, work) => {
                result.unwrap_or_else(|_| Err(TopologyError::timeout(operation, deadline)))
            }
        }
    }

    /// Discover the service ports the cluster's enabled listeners need
    pub async fn discover_ports(&self, cluster: &ClusterRef, cancel: &CancellationToken) -> PortDiscovery {
        let span = info_span!(
            "discover_ports",
            discovery_id = %Uuid::new_v4(),
            cluster = %cluster.key()
        );
        let start_time = Instant::now();

        let result = self
            .bounded("port discovery", cancel, async {
                let session = self.open_session(cluster).await?;
                let mut warnings = session.warnings;

                let listeners = session.value.list_all_listeners().await?;
                let ports = map_listeners(&listeners).drain_into(&mut warnings);

                Ok(Outcome {
                    value: ports,
                    warnings,
                })
            })
            .instrument(span.clone())
            .await;

        record_discovery(&result, start_time.elapsed());
        span.in_scope(|| match &result {
            Ok(outcome) => info!(
                ports = outcome.value.len(),
                warnings = outcome.warnings.len(),
                "Port discovery finished"
            ),
            Err(err) => warn!(kind = err.kind(), error = %err, "Port discovery failed"),
        });

        result
    }

    /// Discover the node statuses the cluster reports
    pub async fn discover_nodes(
        &self,
        cluster: &ClusterRef,
        cancel: &CancellationToken,
    ) -> TopologyResult<Outcome<Vec<NodeStatus>>> {
        let span = info_span!(
            "discover_nodes",
            discovery_id = %Uuid::new_v4(),
            cluster = %cluster.key()
        );

        self.bounded("node discovery", cancel, async {
            let session = self.open_session(cluster).await?;
            let nodes = session.value.node_statuses().await?;
            Ok(Outcome {
                value: nodes,
                warnings: session.warnings,
            })
        })
        .instrument(span)
        .await
    }

    /// Like [`discover_ports`](Self::discover_ports), sharing one run between concurrent callers
    ///
    /// A caller that joins a running discovery receives that run's result. The
    /// shared run is cancelled only by its deadline, not by any single caller.
    pub async fn discover_ports_coalesced(&self, cluster: &ClusterRef) -> PortDiscovery {
        let key = cluster.key();
        let this = self.clone();
        let cluster = cluster.clone();
        self.in_flight
            .run(&key, move || async move {
                this.discover_ports(&cluster, &CancellationToken::new()).await
            })
            .await
    }
}
