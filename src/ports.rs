//! # Port Mapping
//!
//! Turns discovered listeners into the service ports that expose them.
//!
//! Per listener:
//! - disabled listeners are dropped
//! - a type mentioning `udp`, `dtls` or `quic` (any case) is UDP, anything else TCP
//! - the port comes from the `host:port` bind address
//! - the name is the listener id with `:` replaced by `-`
//!
//! Output order follows input order. Ports are not sorted or de-duplicated.
//! A listener whose bind address has no usable port is left out and reported
//! as a [`WarningReason::SkippedListener`] warning instead of failing the run.

use tracing::warn;

use crate::core::types::{DiscoveryWarning, Listener, Outcome, PortProtocol, PortSpec, WarningReason};
use crate::observability::metrics::record_skipped_listeners;

const UDP_MARKERS: [&str; 3] = ["udp", "dtls", "quic"];

/// Classify a listener type as TCP or UDP
pub fn classify_protocol(listener_type: &str) -> PortProtocol {
    let lowered = listener_type.to_ascii_lowercase();
    if UDP_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        PortProtocol::Udp
    } else {
        PortProtocol::Tcp
    }
}

/// Service port name for a listener id; port names may not contain colons
pub fn port_name(listener_id: &str) -> String {
    listener_id.replace(':', "-")
}

/// Split `host:port` (or `[v6-host]:port`) and return the port part
///
/// Fails when there is no port separator or when an unbracketed host itself
/// contains a colon.
pub fn split_bind_port(bind: &str) -> Result<&str, String> {
    if let Some(rest) = bind.strip_prefix('[') {
        let (_, after_host) = rest
            .split_once(']')
            .ok_or_else(|| format!("missing ']' in address {}", bind))?;
        return after_host
            .strip_prefix(':')
            .ok_or_else(|| format!("missing port in address {}", bind));
    }

    let (host, port) = bind
        .rsplit_once(':')
        .ok_or_else(|| format!("missing port in address {}", bind))?;
    if host.contains(':') {
        return Err(format!("too many colons in address {}", bind));
    }
    Ok(port)
}

/// Extract a usable port number from a bind address
pub fn parse_bind_port(bind: &str) -> Result<u16, String> {
    let raw = split_bind_port(bind)?;
    let port: u16 = raw
        .parse()
        .map_err(|e| format!("invalid port '{}' in address {}: {}", raw, bind, e))?;
    if port == 0 {
        return Err(format!("port 0 in address {} cannot be exposed", bind));
    }
    Ok(port)
}

/// Map listeners to port specs, reporting skipped listeners as warnings
pub fn map_listeners(listeners: &[Listener]) -> Outcome<Vec<PortSpec>> {
    let mut ports = Vec::with_capacity(listeners.len());
    let mut warnings = Vec::new();

    for listener in listeners.iter().filter(|l| l.enabled) {
        let port = match parse_bind_port(&listener.bind) {
            Ok(port) => port,
            Err(reason) => {
                warn!(listener = %listener.id, bind = %listener.bind, reason = %reason, "Skipping listener");
                warnings.push(DiscoveryWarning::new(
                    WarningReason::SkippedListener,
                    format!("listener {} skipped: {}", listener.id, reason),
                ));
                continue;
            }
        };

        ports.push(PortSpec {
            name: port_name(&listener.id),
            protocol: classify_protocol(&listener.listener_type),
            port,
            target_port: port,
        });
    }

    record_skipped_listeners(warnings.len());

    Outcome {
        value: ports,
        warnings,
    }
}

/// Map listeners to port specs, dropping listeners without a usable port
pub fn to_port_specs(listeners: &[Listener]) -> Vec<PortSpec> {
    map_listeners(listeners).value
}
