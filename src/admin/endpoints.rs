//! # Admin Endpoint Discovery
//!
//! Typed access to the admin API endpoints that describe a cluster's run-time
//! topology: node statuses, protocol gateways, and listeners of the broker
//! core and of every running gateway.
//!
//! Every endpoint shares one policy: anything other than 200 is
//! [`TopologyError::UnexpectedStatus`] carrying the path, status and raw body,
//! and a body that does not decode into the expected array is
//! [`TopologyError::DecodeFailure`]. A failing sub-request aborts the composite
//! listener discovery; partial results are never returned.

use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

use crate::admin::client::AdminApi;
use crate::auth::credentials::Credential;
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::types::{Gateway, Listener, MemberCandidate, NodeStatus};

/// Cluster node statuses
pub const NODES_PATH: &str = "api/v5/nodes";

/// Protocol gateway list
pub const GATEWAYS_PATH: &str = "api/v5/gateway";

/// Listeners of the broker core
pub const LISTENERS_PATH: &str = "api/v5/listeners";

/// Admin API access bound to one selected member, credential and port
#[derive(Clone)]
pub struct AdminSession {
    api: Arc<dyn AdminApi>,
    member: MemberCandidate,
    credential: Credential,
    port: u16,
}

impl AdminSession {
    pub fn new(api: Arc<dyn AdminApi>, member: MemberCandidate, credential: Credential, port: u16) -> Self {
        Self {
            api,
            member,
            credential,
            port,
        }
    }

    pub fn member(&self) -> &MemberCandidate {
        &self.member
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// GET `path` and decode a 200 response body as `T`
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> TopologyResult<T> {
        let response = self
            .api
            .call(&self.member, &self.credential, self.port, Method::GET, path, None)
            .await?;

        if !response.is_ok() {
            return Err(TopologyError::unexpected_status(
                path,
                response.status,
                &response.body,
            ));
        }

        serde_json::from_slice(&response.body).map_err(|e| TopologyError::decode(path, e.to_string()))
    }

    /// Node statuses as reported by the cluster
    pub async fn node_statuses(&self) -> TopologyResult<Vec<NodeStatus>> {
        let nodes: Vec<NodeStatus> = self.get_json(NODES_PATH).await?;
        debug!(member = %self.member.name, nodes = nodes.len(), "Fetched node statuses");
        Ok(nodes)
    }

    /// Protocol gateways and their run states
    pub async fn list_gateways(&self) -> TopologyResult<Vec<Gateway>> {
        let gateways: Vec<Gateway> = self.get_json(GATEWAYS_PATH).await?;
        debug!(member = %self.member.name, gateways = gateways.len(), "Fetched gateways");
        Ok(gateways)
    }

    /// Listeners served by `path`, either the core or a gateway listener endpoint
    pub async fn list_listeners(&self, path: &str) -> TopologyResult<Vec<Listener>> {
        let listeners: Vec<Listener> = self.get_json(path).await?;
        debug!(member = %self.member.name, path = %path, listeners = listeners.len(), "Fetched listeners");
        Ok(listeners)
    }

    /// Core listeners followed by the listeners of every running gateway
    ///
    /// Order is core first, then gateways in listing order. Gateways whose
    /// status is not `running` (ignoring case) contribute nothing.
    pub async fn list_all_listeners(&self) -> TopologyResult<Vec<Listener>> {
        let mut listeners = self.list_listeners(LISTENERS_PATH).await?;
        let core_count = listeners.len();

        let gateways = self.list_gateways().await?;
        let mut running = 0;
        for gateway in gateways.iter().filter(|g| g.is_running()) {
            running += 1;
            let gateway_listeners = self.list_listeners(&gateway.listeners_path()).await?;
            listeners.extend(gateway_listeners);
        }

        info!(
            member = %self.member.name,
            core_listeners = core_count,
            gateways = gateways.len(),
            running_gateways = running,
            total_listeners = listeners.len(),
            "Discovered listeners"
        );

        Ok(listeners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::client::AdminResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned responses by path and records every requested path
    struct CannedAdminApi {
        responses: HashMap<String, AdminResponse>,
        requested: Mutex<Vec<String>>,
    }

    impl CannedAdminApi {
        fn new(responses: &[(&str, u16, &str)]) -> Self {
            Self {
                responses: responses
                    .iter()
                    .map(|(path, status, body)| (path.to_string(), AdminResponse::new(*status, *body)))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AdminApi for CannedAdminApi {
        async fn call(
            &self,
            _member: &MemberCandidate,
            _credential: &Credential,
            _port: u16,
            _method: Method,
            path: &str,
            _body: Option<Vec<u8>>,
        ) -> TopologyResult<AdminResponse> {
            self.requested.lock().unwrap().push(path.to_string());
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| TopologyError::unreachable(path, "connection refused"))
        }
    }

    fn session(api: Arc<CannedAdminApi>) -> AdminSession {
        AdminSession::new(
            api,
            MemberCandidate {
                name: "emqx-core-0".to_string(),
                address: Some("10.0.0.1".to_string()),
                ..Default::default()
            },
            Credential::new("admin", "public"),
            18083,
        )
    }

    #[tokio::test]
    async fn test_all_listeners_core_then_running_gateways() {
        let api = Arc::new(CannedAdminApi::new(&[
            (
                LISTENERS_PATH,
                200,
                r#"[{"enable": true, "id": "tcp:default", "bind": "0.0.0.0:1883", "type": "tcp"}]"#,
            ),
            (
                GATEWAYS_PATH,
                200,
                r#"[{"name": "coap", "status": "stopped"}, {"name": "mqttsn", "status": "RUNNING"}, {"name": "exproto", "status": "Running"}]"#,
            ),
            (
                "api/v5/gateway/mqttsn/listeners",
                200,
                r#"[{"enable": true, "id": "mqttsn:udp:default", "bind": "1884", "type": "udp"}]"#,
            ),
            (
                "api/v5/gateway/exproto/listeners",
                200,
                r#"[{"enable": true, "id": "exproto:tcp:default", "bind": "0.0.0.0:7993", "type": "tcp"}]"#,
            ),
        ]));

        let listeners = session(api.clone()).list_all_listeners().await.unwrap();
        let ids: Vec<&str> = listeners.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["tcp:default", "mqttsn:udp:default", "exproto:tcp:default"]);

        let requested = api.requested.lock().unwrap().clone();
        assert!(!requested.contains(&"api/v5/gateway/coap/listeners".to_string()));
    }

    #[tokio::test]
    async fn test_gateway_failure_aborts_composite() {
        let api = Arc::new(CannedAdminApi::new(&[
            (LISTENERS_PATH, 200, "[]"),
            (GATEWAYS_PATH, 200, r#"[{"name": "mqttsn", "status": "running"}]"#),
            ("api/v5/gateway/mqttsn/listeners", 500, "internal error"),
        ]));

        let err = session(api).list_all_listeners().await.unwrap_err();
        assert_eq!(
            err,
            TopologyError::UnexpectedStatus {
                path: "api/v5/gateway/mqttsn/listeners".to_string(),
                status: 500,
                body: "internal error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_non_200_is_unexpected_status() {
        let api = Arc::new(CannedAdminApi::new(&[(GATEWAYS_PATH, 401, r#"{"code":"BAD_API_KEY_OR_SECRET"}"#)]));
        let err = session(api).list_gateways().await.unwrap_err();
        match err {
            TopologyError::UnexpectedStatus { path, status, body } => {
                assert_eq!(path, GATEWAYS_PATH);
                assert_eq!(status, 401);
                assert!(body.contains("BAD_API_KEY_OR_SECRET"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_shape_is_decode_failure() {
        let api = Arc::new(CannedAdminApi::new(&[(
            LISTENERS_PATH,
            200,
            r#"{"data": []}"#,
        )]));
        let err = session(api).list_listeners(LISTENERS_PATH).await.unwrap_err();
        assert!(matches!(err, TopologyError::DecodeFailure { ref path, .. } if path == LISTENERS_PATH));
    }

    #[tokio::test]
    async fn test_node_statuses() {
        let api = Arc::new(CannedAdminApi::new(&[(
            NODES_PATH,
            200,
            r#"[{"node": "emqx@10.0.0.1", "node_status": "running", "role": "core"}]"#,
        )]));
        let nodes = session(api).node_statuses().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].role.as_deref(), Some("core"));
    }
}
