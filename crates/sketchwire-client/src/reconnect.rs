//! Reconnect with exponential backoff.
//!
//! The sync agent never reconnects by itself; callers that want to stay
//! connected wrap [`connect`](crate::transport::connect) with this policy.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use sketchwire_core::config::ReconnectConfig;

use crate::error::Result;
use crate::transport::{self, Transport, TransportEvent};

/// Exponential backoff reconnection policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Maximum number of attempts (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier.max(1.0),
            max_attempts: config.max_attempts,
        }
    }
}

impl ReconnectPolicy {
    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = base_ms * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Whether attempt number `attempt` (0-indexed) may be made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }
}

/// Run `op` until it succeeds or the policy gives up. Returns the last error.
pub async fn retry_with_backoff<T, F, Fut>(policy: &ReconnectPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !policy.should_retry(attempt.saturating_add(1)) {
                    warn!(attempt, error = %e, "Giving up");
                    return Err(e);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Retrying");
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

/// Connect to the relay, retrying per `policy`.
pub async fn connect_with_backoff(
    url: &str,
    policy: &ReconnectPolicy,
) -> Result<(Transport, mpsc::UnboundedReceiver<TransportEvent>)> {
    let connected = retry_with_backoff(policy, |attempt| async move {
        if attempt > 0 {
            info!(url, attempt, "Reconnecting to relay");
        }
        transport::connect(url).await
    })
    .await?;
    Ok(connected)
}
