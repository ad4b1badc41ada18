//! # Structured Logging
//!
//! Installs the process-wide `tracing` subscriber and provides the helper that
//! turns discovery warnings into log events for callers without an event sink.
//!
//! ## Key Features
//! - JSON or human readable output
//! - `RUST_LOG` style directives layered over the configured level
//! - Tolerates a subscriber that is already installed (tests, embedding)

use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::error::TopologyResult;
use crate::core::types::DiscoveryWarning;
use crate::observability::config::{LogConfig, LogFormat};

/// Parse a level name, falling back to INFO for unknown names
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the tracing subscriber
pub fn init_logging(config: &LogConfig) -> TopologyResult<()> {
    let level = parse_level(&config.level);

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    match config.format {
        LogFormat::Json => {
            let subscriber = Registry::default().with(env_filter).with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            );

            if subscriber.try_init().is_err() {
                warn!("Tracing subscriber already initialized, skipping initialization");
            }
        }
        LogFormat::Text => {
            let subscriber = Registry::default()
                .with(env_filter)
                .with(fmt::layer().with_target(true));

            if subscriber.try_init().is_err() {
                warn!("Tracing subscriber already initialized, skipping initialization");
            }
        }
    }

    info!(level = %level, format = ?config.format, "Structured logging initialized");

    Ok(())
}

/// Emit one warning-level log event per discovery warning
pub fn log_warnings(cluster: &str, warnings: &[DiscoveryWarning]) {
    for warning in warnings {
        warn!(
            cluster = %cluster,
            reason = %warning.reason,
            message = %warning.message,
            "Discovery warning"
        );
    }
}
