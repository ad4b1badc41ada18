//! # Error Handling Module
//!
//! This module defines every failure the topology discovery core can report,
//! using the `thiserror` crate. Each variant carries enough context (which
//! admin path, which namespace, which container) for an operator to act on the
//! message without re-running discovery with extra logging.
//!
//! ## Error Classes
//! - Credential problems (`MissingCredentialSource`, `MalformedCredential`) are
//!   normally downgraded to warnings by the caller and discovery continues
//!   unauthenticated.
//! - Attempt-fatal problems (`NoReadyMember`, `Unreachable`, `Timeout`) end the
//!   current attempt; the next reconcile tick tries again.
//! - Logical mismatches (`UnexpectedStatus`, `DecodeFailure`) mean the broker and
//!   this crate disagree about the admin API and are not transient.
//!
//! Errors are `Clone` so a single in-flight discovery can hand its result to
//! every coalesced waiter.

use std::time::Duration;
use thiserror::Error;

/// Main result type used throughout the crate
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Error types for topology discovery
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// The credential secret or its field does not exist
    #[error("Credential source missing: secret {secret} has no field {field}")]
    MissingCredentialSource { secret: String, field: String },

    /// The credential blob exists but cannot be split into username and password
    #[error("Malformed credential: {reason}")]
    MalformedCredential { reason: String },

    /// No candidate pod reports the target container as ready
    #[error("No ready member in namespace {namespace}: no pod has a ready {container} container")]
    NoReadyMember { namespace: String, container: String },

    /// Transport-level failure talking to a member
    #[error("Failed to reach admin API {path}: {message}")]
    Unreachable { path: String, message: String },

    /// The admin API answered with something other than 200
    #[error("Failed to get API {path}, status: {status}, body: {body}")]
    UnexpectedStatus {
        path: String,
        status: u16,
        body: String,
    },

    /// The admin API body does not match the expected schema
    #[error("Failed to decode response of API {path}: {message}")]
    DecodeFailure { path: String, message: String },

    /// Orchestration layer (pod listing, secret lookup) failure
    #[error("Kubernetes API error: {message}")]
    Kubernetes { message: String },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The discovery deadline expired
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The discovery was cancelled by its caller
    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

impl TopologyError {
    /// Create a missing credential source error
    pub fn missing_credential<S: Into<String>, F: Into<String>>(secret: S, field: F) -> Self {
        Self::MissingCredentialSource {
            secret: secret.into(),
            field: field.into(),
        }
    }

    /// Create a malformed credential error
    pub fn malformed_credential<S: Into<String>>(reason: S) -> Self {
        Self::MalformedCredential {
            reason: reason.into(),
        }
    }

    /// Create a no ready member error
    pub fn no_ready_member<N: Into<String>, C: Into<String>>(namespace: N, container: C) -> Self {
        Self::NoReadyMember {
            namespace: namespace.into(),
            container: container.into(),
        }
    }

    /// Create a transport failure for the given admin path
    pub fn unreachable<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Unreachable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected status error, keeping the raw body for diagnosis
    pub fn unexpected_status<P: Into<String>>(path: P, status: u16, body: &[u8]) -> Self {
        Self::UnexpectedStatus {
            path: path.into(),
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Create a decode failure for the given admin path
    pub fn decode<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::DecodeFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Kubernetes error with a custom message
    pub fn kubernetes<S: Into<String>>(message: S) -> Self {
        Self::Kubernetes {
            message: message.into(),
        }
    }

    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Stable snake_case label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentialSource { .. } => "missing_credential_source",
            Self::MalformedCredential { .. } => "malformed_credential",
            Self::NoReadyMember { .. } => "no_ready_member",
            Self::Unreachable { .. } => "unreachable",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::DecodeFailure { .. } => "decode_failure",
            Self::Kubernetes { .. } => "kubernetes",
            Self::Configuration { .. } => "configuration",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Check if the admin client may retry the request that produced this error
    ///
    /// Only transport faults qualify. Status and decode errors indicate a
    /// logical mismatch with the broker and retrying would return the same.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Suggested delay before the caller's next discovery attempt
    ///
    /// Returns `None` for errors that will not clear up by themselves.
    pub fn requeue_delay(&self) -> Option<Duration> {
        match self {
            Self::NoReadyMember { .. } | Self::Unreachable { .. } | Self::Timeout { .. } => {
                Some(Duration::from_secs(10))
            }
            Self::Kubernetes { .. } => Some(Duration::from_secs(30)),
            _ => None,
        }
    }
}
