//! Discovery metrics, recorded through the `metrics` facade.
//!
//! No exporter is installed here; an embedding controller installs its own
//! recorder and these series show up alongside its metrics.

use metrics::{counter, histogram};
use std::time::Duration;

use crate::core::error::TopologyError;

pub const ADMIN_REQUESTS_TOTAL: &str = "emqx_topology_admin_requests_total";
pub const DISCOVERY_TOTAL: &str = "emqx_topology_discovery_total";
pub const DISCOVERY_ERRORS_TOTAL: &str = "emqx_topology_discovery_errors_total";
pub const DISCOVERY_DURATION_SECONDS: &str = "emqx_topology_discovery_duration_seconds";
pub const SKIPPED_LISTENERS_TOTAL: &str = "emqx_topology_skipped_listeners_total";

/// Count one admin API response
pub fn record_admin_response(path: &str, status: u16) {
    counter!(ADMIN_REQUESTS_TOTAL, "path" => path.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record the result and latency of one discovery run
pub fn record_discovery<T>(result: &Result<T, TopologyError>, elapsed: Duration) {
    histogram!(DISCOVERY_DURATION_SECONDS).record(elapsed.as_secs_f64());
    match result {
        Ok(_) => counter!(DISCOVERY_TOTAL, "outcome" => "success").increment(1),
        Err(err) => {
            counter!(DISCOVERY_TOTAL, "outcome" => "failure").increment(1);
            counter!(DISCOVERY_ERRORS_TOTAL, "kind" => err.kind()).increment(1);
        }
    }
}

/// Count listeners left out of the port list
pub fn record_skipped_listeners(count: usize) {
    if count > 0 {
        counter!(SKIPPED_LISTENERS_TOTAL).increment(count as u64);
    }
}
