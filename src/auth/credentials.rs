//! # Bootstrap Credential Resolution
//!
//! The admin API of every cluster is protected by a bootstrap user stored in a
//! secret as a single `"<username>:<password>"` field. This module decodes that
//! field and, through [`CredentialResolver::resolve_from_store`], degrades to
//! anonymous access with a warning when the secret cannot be used. The broker
//! rejects unauthenticated admin calls explicitly, so the failure still
//! surfaces, just one step later and with a precise status.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::core::error::{TopologyError, TopologyResult};
use crate::core::types::{DiscoveryWarning, Outcome, WarningReason};

/// Admin API username and password
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Empty credential used when the bootstrap user is unavailable
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// Parse a `"<username>:<password>"` blob
    ///
    /// The first colon separates the fields; the password may contain more
    /// colons. Both fields must be non-empty.
    pub fn parse(blob: &[u8]) -> TopologyResult<Self> {
        let text = std::str::from_utf8(blob).map_err(|e| {
            TopologyError::malformed_credential(format!("bootstrap user is not valid UTF-8: {}", e))
        })?;

        let (username, password) = text.split_once(':').ok_or_else(|| {
            TopologyError::malformed_credential("bootstrap user has no ':' separator")
        })?;

        if username.is_empty() {
            return Err(TopologyError::malformed_credential(
                "bootstrap user has an empty username",
            ));
        }
        if password.is_empty() {
            return Err(TopologyError::malformed_credential(
                "bootstrap user has an empty password",
            ));
        }

        Ok(Self::new(username, password))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Secret-like store holding credential blobs
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read one field of a named secret; `Ok(None)` when the secret or the field is absent
    async fn get(&self, namespace: &str, name: &str, field: &str) -> TopologyResult<Option<Vec<u8>>>;
}

/// In-memory credential store for tests and static deployments
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    entries: HashMap<(String, String, String), Vec<u8>>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry<V: Into<Vec<u8>>>(mut self, namespace: &str, name: &str, field: &str, value: V) -> Self {
        self.entries.insert(
            (namespace.to_string(), name.to_string(), field.to_string()),
            value.into(),
        );
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get(&self, namespace: &str, name: &str, field: &str) -> TopologyResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), name.to_string(), field.to_string()))
            .cloned())
    }
}

/// Resolves the bootstrap credential of one cluster
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    namespace: String,
    secret: String,
    field: String,
}

impl CredentialResolver {
    pub fn new<N: Into<String>, S: Into<String>, F: Into<String>>(namespace: N, secret: S, field: F) -> Self {
        Self {
            namespace: namespace.into(),
            secret: secret.into(),
            field: field.into(),
        }
    }

    /// Decode a blob read from the credential source
    ///
    /// `None` means the source did not have the field at all.
    pub fn resolve(&self, blob: Option<&[u8]>) -> TopologyResult<Credential> {
        match blob {
            Some(bytes) => Credential::parse(bytes),
            None => Err(TopologyError::missing_credential(
                self.secret.as_str(),
                self.field.as_str(),
            )),
        }
    }

    /// Fetch and decode the credential, degrading to anonymous access on failure
    pub async fn resolve_from_store(&self, store: &dyn CredentialStore) -> Outcome<Credential> {
        let result = match store.get(&self.namespace, &self.secret, &self.field).await {
            Ok(blob) => self.resolve(blob.as_deref()),
            Err(err) => Err(err),
        };

        match result {
            Ok(credential) => {
                debug!(secret = %self.secret, username = %credential.username, "Resolved bootstrap user");
                Outcome::clean(credential)
            }
            Err(err) => {
                warn!(
                    secret = %self.secret,
                    error = %err,
                    "Failed to get bootstrap user, continuing without credentials"
                );
                Outcome::warned(
                    Credential::anonymous(),
                    DiscoveryWarning::new(WarningReason::FailedToGetBootstrapUser, err.to_string()),
                )
            }
        }
    }
}
