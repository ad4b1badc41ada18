//! # Retry Module
//!
//! Bounded retry with exponential backoff for admin API transport failures.
//! Only errors for which [`crate::core::error::TopologyError::is_retryable`] holds are retried;
//! status and decode errors are returned on the first occurrence.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::core::error::TopologyResult;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Factor applied to the delay after each retry
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoff_multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err("initial_delay must not exceed max_delay".to_string());
        }
        Ok(())
    }

    /// Run `operation`, retrying retryable failures according to this policy
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> TopologyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TopologyResult<T>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    debug!(
                        operation = %operation_name,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transport failure"
                    );
                    metrics::counter!("emqx_topology_admin_retries_total").increment(1);
                    sleep(delay).await;
                }
                Err(err) => {
                    if err.is_retryable() && self.max_retries > 0 {
                        warn!(
                            operation = %operation_name,
                            attempts = retry + 1,
                            error = %err,
                            "All retry attempts failed"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}
