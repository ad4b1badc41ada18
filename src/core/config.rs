//! # Configuration Module
//!
//! Configuration structures and loading for topology discovery.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support (`EMQX_TOPOLOGY_*`)
//! - Human readable durations ("5s", "250ms")
//! - Validation that reports every problem at once

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::core::error::{TopologyError, TopologyResult};
use crate::core::retry::RetryPolicy;
use crate::core::types::ClusterRef;
use crate::observability::config::LogConfig;

/// Port the EMQX dashboard and admin API listen on unless configured otherwise
pub const DEFAULT_ADMIN_PORT: u16 = 18083;

/// Name of the broker container inside a cluster pod
pub const DEFAULT_CONTAINER_NAME: &str = "emqx";

/// Secret field holding `<username>:<password>`
pub const DEFAULT_CREDENTIAL_FIELD: &str = "bootstrap_user";

/// Suffix appended to the cluster name to find its bootstrap secret
pub const DEFAULT_SECRET_SUFFIX: &str = "-bootstrap-user";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Admin API client settings
    pub admin: AdminConfig,

    /// Member selection and credential settings
    pub discovery: DiscoveryConfig,

    /// Logging settings
    pub logging: LogConfig,

    /// Cluster targeted by the command line tool
    pub cluster: Option<ClusterTarget>,
}

/// URL scheme used to reach the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminScheme {
    #[default]
    Http,
    Https,
}

impl AdminScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminScheme::Http => "http",
            AdminScheme::Https => "https",
        }
    }
}

impl std::str::FromStr for AdminScheme {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(AdminScheme::Http),
            "https" => Ok(AdminScheme::Https),
            other => Err(TopologyError::config(format!(
                "Unknown admin scheme '{}', expected http or https",
                other
            ))),
        }
    }
}

/// Admin API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// http or https
    pub scheme: AdminScheme,

    /// Port used when the cluster's admin port cannot be determined
    pub default_port: u16,

    /// Timeout for a single admin request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Retry policy for transport failures
    pub retry: RetryPolicy,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            scheme: AdminScheme::Http,
            default_port: DEFAULT_ADMIN_PORT,
            request_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Container whose readiness makes a pod eligible
    pub container_name: String,

    /// Secret field holding the bootstrap user
    pub credential_field: String,

    /// Suffix turning a cluster name into its bootstrap secret name
    pub secret_suffix: String,

    /// Deadline for one whole discovery run
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            credential_field: DEFAULT_CREDENTIAL_FIELD.to_string(),
            secret_suffix: DEFAULT_SECRET_SUFFIX.to_string(),
            deadline: Duration::from_secs(30),
        }
    }
}

impl DiscoveryConfig {
    /// Name of the secret holding the bootstrap user of `cluster_name`
    pub fn secret_name(&self, cluster_name: &str) -> String {
        format!("{}{}", cluster_name, self.secret_suffix)
    }
}

/// Cluster selected on the command line or in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTarget {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Name of the Service exposing the dashboard port, if any
    #[serde(default)]
    pub dashboard_service: Option<String>,
    /// Fixed admin port, taking precedence over the dashboard service
    #[serde(default)]
    pub admin_port: Option<u16>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ClusterTarget {
    /// Build the discovery target; the admin port is filled in by the caller
    pub fn to_cluster_ref(&self) -> ClusterRef {
        let mut cluster = ClusterRef::new(self.name.clone(), self.namespace.clone());
        cluster.labels = self.labels.clone();
        if let Some(port) = self.admin_port {
            cluster.admin_port = Some(Ok(port));
        }
        cluster
    }
}

impl TopologyConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> TopologyResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| TopologyError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: TopologyConfig = serde_yaml::from_str(&content)
            .map_err(|e| TopologyError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> TopologyResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| TopologyError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: TopologyConfig = serde_json::from_str(&content)
            .map_err(|e| TopologyError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern: EMQX_TOPOLOGY_<SECTION>_<FIELD>
    /// For example: EMQX_TOPOLOGY_ADMIN_DEFAULT_PORT=18084
    pub fn apply_env_overrides(&mut self) -> TopologyResult<()> {
        use std::env;

        if let Ok(scheme) = env::var("EMQX_TOPOLOGY_ADMIN_SCHEME") {
            self.admin.scheme = scheme.parse()?;
        }

        if let Ok(port) = env::var("EMQX_TOPOLOGY_ADMIN_DEFAULT_PORT") {
            self.admin.default_port = port.parse().map_err(|e| {
                TopologyError::config(format!("Invalid EMQX_TOPOLOGY_ADMIN_DEFAULT_PORT: {}", e))
            })?;
        }

        if let Ok(timeout) = env::var("EMQX_TOPOLOGY_ADMIN_REQUEST_TIMEOUT") {
            self.admin.request_timeout = humantime::parse_duration(&timeout).map_err(|e| {
                TopologyError::config(format!("Invalid EMQX_TOPOLOGY_ADMIN_REQUEST_TIMEOUT: {}", e))
            })?;
        }

        if let Ok(retries) = env::var("EMQX_TOPOLOGY_ADMIN_MAX_RETRIES") {
            self.admin.retry.max_retries = retries.parse().map_err(|e| {
                TopologyError::config(format!("Invalid EMQX_TOPOLOGY_ADMIN_MAX_RETRIES: {}", e))
            })?;
        }

        if let Ok(name) = env::var("EMQX_TOPOLOGY_DISCOVERY_CONTAINER_NAME") {
            self.discovery.container_name = name;
        }

        if let Ok(deadline) = env::var("EMQX_TOPOLOGY_DISCOVERY_DEADLINE") {
            self.discovery.deadline = humantime::parse_duration(&deadline).map_err(|e| {
                TopologyError::config(format!("Invalid EMQX_TOPOLOGY_DISCOVERY_DEADLINE: {}", e))
            })?;
        }

        if let Ok(level) = env::var("EMQX_TOPOLOGY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("EMQX_TOPOLOGY_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration, reporting every problem in one error
    pub fn validate(&self) -> TopologyResult<()> {
        let mut errors = Vec::new();

        if self.admin.default_port == 0 {
            errors.push("admin.default_port must not be 0".to_string());
        }

        if self.admin.request_timeout.is_zero() {
            errors.push("admin.request_timeout must be greater than zero".to_string());
        }

        if let Err(e) = self.admin.retry.validate() {
            errors.push(format!("admin.retry: {}", e));
        }

        if self.discovery.container_name.trim().is_empty() {
            errors.push("discovery.container_name must not be empty".to_string());
        }

        if self.discovery.credential_field.trim().is_empty() {
            errors.push("discovery.credential_field must not be empty".to_string());
        }

        if self.discovery.deadline < self.admin.request_timeout {
            errors.push(format!(
                "discovery.deadline ({}) must not be shorter than admin.request_timeout ({})",
                humantime::format_duration(self.discovery.deadline),
                humantime::format_duration(self.admin.request_timeout)
            ));
        }

        if let Some(cluster) = &self.cluster {
            if cluster.name.trim().is_empty() {
                errors.push("cluster.name must not be empty".to_string());
            }
            if cluster.admin_port == Some(0) {
                errors.push("cluster.admin_port must not be 0".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TopologyError::config(errors.join("; ")))
        }
    }
}
