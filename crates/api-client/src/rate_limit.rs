// In crates/api-client/src/rate_limit.rs

use std::time::Duration;
use tokio::time::sleep;

/// Spaces out requests so the exchange's rate ceiling is never hit.
///
/// Every request waits a fixed delay before it is sent. Trade-history requests
/// wait slightly longer since they trip the limit more easily.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
    history_delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration, history_delay: Duration) -> Self {
        Self { delay, history_delay }
    }

    pub async fn wait(&self) {
        sleep(self.delay).await;
    }

    pub async fn wait_history(&self) {
        sleep(self.history_delay).await;
    }
}
