//! # EMQX Topology - Command Line Entry Point
//!
//! Runs one port discovery against the configured cluster and prints the
//! resulting service ports as YAML on stdout.
//!
//! ```text
//! emqx-topology [CONFIG]
//! ```
//!
//! The configuration path comes from the first argument or from
//! `EMQX_TOPOLOGY_CONFIG`. Without either, defaults plus `EMQX_TOPOLOGY_*`
//! environment overrides are used, which still requires a `cluster` section
//! and therefore fails fast. Files ending in `.json` are read as JSON,
//! anything else as YAML.
//!
//! Warnings raised during discovery are logged; errors exit non-zero.

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use emqx_topology::core::config::TopologyConfig;
use emqx_topology::discovery::{lookup_admin_port, KubePodLister, KubeSecretStore};
use emqx_topology::observability::init_logging;
use emqx_topology::observability::logging::log_warnings;
use emqx_topology::TopologyDiscovery;

const CONFIG_ENV: &str = "EMQX_TOPOLOGY_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().await?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting topology discovery");

    let target = config
        .cluster
        .clone()
        .with_context(|| format!("No cluster configured; pass a config file or set {}", CONFIG_ENV))?;

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let mut cluster = target.to_cluster_ref();
    if cluster.admin_port.is_none() {
        if let Some(service) = target.dashboard_service.as_deref() {
            let lookup = lookup_admin_port(&client, &cluster.namespace, service)
                .await
                .map_err(|e| e.to_string());
            cluster = cluster.with_admin_port(lookup);
        }
    }

    let discovery = TopologyDiscovery::with_http_client(
        config,
        Arc::new(KubePodLister::new(client.clone())),
        Arc::new(KubeSecretStore::new(client)),
    )
    .context("Failed to build discovery service")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling discovery");
            on_interrupt.cancel();
        }
    });

    let outcome = discovery
        .discover_ports(&cluster, &cancel)
        .await
        .with_context(|| format!("Port discovery failed for cluster {}", cluster.key()))?;

    log_warnings(&cluster.key(), &outcome.warnings);

    let rendered = serde_yaml::to_string(&outcome.value).context("Failed to render ports")?;
    print!("{}", rendered);

    info!(ports = outcome.value.len(), "Topology discovery complete");
    Ok(())
}

async fn load_config() -> anyhow::Result<TopologyConfig> {
    let path = std::env::args().nth(1).or_else(|| std::env::var(CONFIG_ENV).ok());

    let config = match path {
        Some(path) if path.ends_with(".json") => TopologyConfig::load_from_json(&path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        Some(path) => TopologyConfig::load_from_file(&path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => {
            let mut config = TopologyConfig::default();
            config.apply_env_overrides()?;
            config.validate()?;
            config
        }
    };

    Ok(config)
}
