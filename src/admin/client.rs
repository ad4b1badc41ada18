//! # Admin API Client
//!
//! Issues authenticated requests against the HTTP management interface of one
//! cluster member and returns the raw status and body.
//!
//! The client only judges the transport. A 200, a 404 and a 500 are all
//! successful calls here; each endpoint applies its own status policy on top.
//! Connection failures, timeouts and unreadable bodies become
//! [`TopologyError::Unreachable`] and are retried with backoff according to
//! the configured [`RetryPolicy`].

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as HttpClient, Method};
use std::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::auth::credentials::Credential;
use crate::core::config::{AdminConfig, AdminScheme};
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::retry::RetryPolicy;
use crate::core::types::MemberCandidate;
use crate::observability::metrics::record_admin_response;

/// Raw admin API response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl AdminResponse {
    pub fn new<B: Into<Vec<u8>>>(status: u16, body: B) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Authenticated access to a member's admin API
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Send one request and return status and body; only transport failures are errors
    async fn call(
        &self,
        member: &MemberCandidate,
        credential: &Credential,
        port: u16,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> TopologyResult<AdminResponse>;
}

/// `reqwest` backed admin API client
#[derive(Debug, Clone)]
pub struct AdminApiClient {
    client: HttpClient,
    scheme: AdminScheme,
    retry: RetryPolicy,
}

impl AdminApiClient {
    /// Create a client from the admin configuration
    pub fn new(config: &AdminConfig) -> TopologyResult<Self> {
        let client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TopologyError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            scheme: config.scheme,
            retry: config.retry.clone(),
        })
    }

    /// Build `<scheme>://<member-address>:<port>/<path>`
    pub fn request_url(&self, member: &MemberCandidate, port: u16, path: &str) -> TopologyResult<Url> {
        let address = member.address.as_deref().filter(|a| !a.is_empty()).ok_or_else(|| {
            TopologyError::unreachable(path, format!("member {} has no address", member.name))
        })?;

        let host = if address.contains(':') && !address.starts_with('[') {
            format!("[{}]", address)
        } else {
            address.to_string()
        };

        let base = Url::parse(&format!("{}://{}:{}/", self.scheme.as_str(), host, port))
            .map_err(|e| TopologyError::unreachable(path, format!("invalid member address {}: {}", address, e)))?;

        base.join(path.trim_start_matches('/'))
            .map_err(|e| TopologyError::unreachable(path, format!("invalid admin path: {}", e)))
    }

    async fn send_once(
        &self,
        url: &Url,
        credential: &Credential,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> TopologyResult<AdminResponse> {
        let mut request = self.client.request(method, url.clone());

        if !credential.is_anonymous() {
            request = request.basic_auth(&credential.username, Some(&credential.password));
        }

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TopologyError::unreachable(path, format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TopologyError::unreachable(path, format!("Failed to read response body: {}", e)))?;

        Ok(AdminResponse::new(status, bytes.to_vec()))
    }
}

#[async_trait]
impl AdminApi for AdminApiClient {
    async fn call(
        &self,
        member: &MemberCandidate,
        credential: &Credential,
        port: u16,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> TopologyResult<AdminResponse> {
        let url = self.request_url(member, port, path)?;
        let start_time = Instant::now();

        trace!(member = %member.name, method = %method, url = %url, "Calling admin API");

        let response = self
            .retry
            .run(path, || {
                self.send_once(&url, credential, method.clone(), path, body.as_deref())
            })
            .await?;

        record_admin_response(path, response.status);
        debug!(
            member = %member.name,
            path = %path,
            status = response.status,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Admin API responded"
        );

        Ok(response)
    }
}
