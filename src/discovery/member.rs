//! # Member Selection
//!
//! Picks the cluster member the admin API requests go to. The policy is
//! deterministic: candidates are walked in the order the orchestration layer
//! lists them and the first one whose broker container is ready wins. Any ready
//! member will do since every discovery call is a read.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::error::{TopologyError, TopologyResult};
use crate::core::types::MemberCandidate;

/// Lists the pods of a cluster
#[async_trait]
pub trait PodLister: Send + Sync {
    /// Pods in `namespace` carrying every label in `labels`, in listing order
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> TopologyResult<Vec<MemberCandidate>>;
}

/// Fixed pod list for tests and static deployments
///
/// Filtering mirrors a label selector: namespace must match and every
/// requested label must be present with the same value.
#[derive(Debug, Clone, Default)]
pub struct StaticPodLister {
    members: Vec<MemberCandidate>,
}

impl StaticPodLister {
    pub fn new(members: Vec<MemberCandidate>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl PodLister for StaticPodLister {
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> TopologyResult<Vec<MemberCandidate>> {
        Ok(self
            .members
            .iter()
            .filter(|member| member.namespace == namespace)
            .filter(|member| {
                labels
                    .iter()
                    .all(|(key, value)| member.labels.get(key) == Some(value))
            })
            .cloned()
            .collect())
    }
}

/// Return the first candidate with a ready container named `container_name`
pub fn first_ready_member(
    candidates: Vec<MemberCandidate>,
    namespace: &str,
    container_name: &str,
) -> TopologyResult<MemberCandidate> {
    candidates
        .into_iter()
        .find(|candidate| candidate.has_ready_container(container_name))
        .ok_or_else(|| TopologyError::no_ready_member(namespace, container_name))
}

/// Selects one ready member of a cluster through a [`PodLister`]
#[derive(Clone)]
pub struct MemberSelector {
    lister: Arc<dyn PodLister>,
    container_name: String,
}

impl MemberSelector {
    pub fn new<S: Into<String>>(lister: Arc<dyn PodLister>, container_name: S) -> Self {
        Self {
            lister,
            container_name: container_name.into(),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// List the cluster's pods and pick the first ready one
    pub async fn select(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> TopologyResult<MemberCandidate> {
        let candidates = self.lister.list(namespace, labels).await?;
        let total = candidates.len();

        match first_ready_member(candidates, namespace, &self.container_name) {
            Ok(member) => {
                debug!(
                    namespace = %namespace,
                    member = %member.name,
                    candidates = total,
                    "Selected ready member"
                );
                Ok(member)
            }
            Err(err) => {
                warn!(
                    namespace = %namespace,
                    container = %self.container_name,
                    candidates = total,
                    "No ready member found"
                );
                Err(err)
            }
        }
    }
}
