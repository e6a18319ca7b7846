// In crates/engine/src/context.rs

use crate::retry::{ConnectPolicy, RetryPolicy};
use crate::{Error, Result};
use app_config::TradeSettings;
use events::SessionEvent;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Everything a running session shares with its components.
///
/// Cloning is cheap and every clone observes the same cancellation token and
/// feeds the same event channel.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub trade: TradeSettings,
    pub retry: RetryPolicy,
    pub connect: ConnectPolicy,
    /// Pause before the next round when the only configured asset has no price.
    pub price_failure_wait: Duration,
    cancel: CancellationToken,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
    pub fn new(
        trade: TradeSettings,
        cancel: CancellationToken,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            retry: RetryPolicy::from_settings(&trade),
            connect: ConnectPolicy::from_settings(&trade),
            price_failure_wait: Duration::from_secs(60),
            trade,
            cancel,
            events,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with `Cancelled` once the session has been asked to stop.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration`, waking early with `Cancelled` if the session is stopped.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Sends `event` to every listener. Having no listener is fine.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Runs an exchange read, repeating it while it fails with a retryable
    /// error and attempts remain.
    ///
    /// Cancellation is checked before every attempt and during every backoff.
    pub async fn retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = api_client::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            self.checkpoint()?;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    let wait = self.retry.delay_for(&e, attempt);
                    warn!(call = what, attempt, error = %e, wait_ms = wait.as_millis() as u64, "Exchange call failed, retrying");
                    self.sleep(wait).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
