// In crates/strategies/src/types.rs

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HermesSettings {
    /// Number of historical prices fetched for each analysis.
    #[serde(default = "default_price_count")]
    pub price_count: usize,
    /// Minutes between two consecutive historical prices.
    #[serde(default = "default_interval_mins")]
    pub interval_mins: u64,
    #[serde(default = "default_ema_period")]
    pub ema_period: usize,
}

impl HermesSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins * 60)
    }
}

impl Default for HermesSettings {
    fn default() -> Self {
        Self {
            price_count: default_price_count(),
            interval_mins: default_interval_mins(),
            ema_period: default_ema_period(),
        }
    }
}

fn default_price_count() -> usize { 25 }
fn default_interval_mins() -> u64 { 60 }
fn default_ema_period() -> usize { 30 }
