// In crates/engine/src/retry.rs

use app_config::TradeSettings;
use std::time::Duration;

/// Bounds on how often a failed exchange read is repeated within one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub attempts: u32,
    pub backoff: Duration,
    /// Used instead of `backoff` when the exchange said we are going too fast.
    pub rate_limit_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(trade: &TradeSettings) -> Self {
        Self {
            attempts: trade.retry_attempts.max(1),
            backoff: Duration::from_secs(trade.retry_backoff_secs),
            rate_limit_backoff: Duration::from_secs(trade.rate_limit_backoff_secs),
        }
    }

    /// How long to wait after attempt number `attempt` (1-based) failed with `error`.
    pub fn delay_for(&self, error: &api_client::Error, attempt: u32) -> Duration {
        match error.kind() {
            api_client::ErrorKind::RateLimited => self.rate_limit_backoff,
            _ => self.backoff * attempt,
        }
    }
}

/// What the session does when it cannot reach the exchange at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    /// Give up on the first failure instead of waiting it out.
    pub exit_on_failure: bool,
    /// Short waits allowed before falling back to the long one.
    pub retries: u32,
    pub short_wait: Duration,
    pub long_wait: Duration,
}

impl ConnectPolicy {
    pub fn from_settings(trade: &TradeSettings) -> Self {
        Self {
            exit_on_failure: trade.exit_on_init_failure,
            retries: trade.connect_retries,
            short_wait: Duration::from_secs(10),
            long_wait: Duration::from_secs(5 * 60),
        }
    }
}
