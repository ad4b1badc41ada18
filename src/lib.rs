//! # EMQX Topology Library
//!
//! Discovers the run-time topology of a broker cluster managed on Kubernetes:
//! which members are ready, which protocol listeners are enabled, and which
//! service ports are needed to expose them.
//!
//! ## Flow
//!
//! A discovery run resolves the cluster's bootstrap credential, picks the
//! first ready member, queries that member's admin API for core and gateway
//! listeners, and maps the enabled listeners to [`PortSpec`]s. Soft failures
//! (no credential secret, unknown admin port, listener without a usable bind
//! port) do not abort the run; they come back as [`DiscoveryWarning`]s next to
//! the result.
//!
//! ## Seams
//!
//! Cluster membership ([`discovery::PodLister`]), credential secrets
//! ([`auth::CredentialStore`]) and the admin API transport
//! ([`admin::AdminApi`]) are traits, so the pipeline runs against Kubernetes
//! and `reqwest` in production and against in-memory fakes in tests.

/// Error types, configuration, retry policy and shared data types
pub mod core;

/// Admin API client and typed endpoints
pub mod admin;

/// Bootstrap credential parsing and lookup
pub mod auth;

/// Ready member selection and Kubernetes adapters
pub mod discovery;

/// Logging setup and discovery metrics
pub mod observability;

/// Listener to service port mapping
pub mod ports;

/// Composed discovery service
pub mod topology;

pub use core::config::TopologyConfig;
pub use core::error::{TopologyError, TopologyResult};
pub use core::types::{
    ClusterRef, DiscoveryWarning, Gateway, Listener, MemberCandidate, NodeStatus, Outcome,
    PortProtocol, PortSpec, WarningReason,
};
pub use topology::{resolve_admin_port, TopologyDiscovery};
