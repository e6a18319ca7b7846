// In crates/app-config/src/types.rs

use crate::{Error, Result};
use core_types::{AssetInfo, TradingMode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use strategies::types::HermesSettings;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Credentials and transport settings for the exchange API.
    pub exchange: ExchangeSettings,
    /// Where the position ledger and the stats book live.
    pub ledger: LedgerSettings,
    /// What to trade and how.
    pub trade: TradeSettings,
    #[serde(default)]
    pub strategies: StrategySettings,
}

impl Settings {
    /// Rejects settings the trading loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.trade.assets.is_empty() {
            return Err(Error::Invalid("no assets to trade were specified".into()));
        }
        for asset in &self.trade.assets {
            AssetInfo::lookup(asset).map_err(|e| Error::Invalid(e.to_string()))?;
        }
        if self.trade.purchase_unit <= Decimal::ZERO {
            return Err(Error::Invalid("purchase_unit must be positive".into()));
        }
        if self.trade.profit_margin <= Decimal::ZERO || self.trade.profit_margin >= Decimal::ONE {
            return Err(Error::Invalid("profit_margin must be between 0 and 1".into()));
        }
        if self.trade.random_snooze && self.trade.snooze_times_mins.is_empty() {
            return Err(Error::Invalid(
                "random_snooze requires at least one entry in snooze_times_mins".into(),
            ));
        }
        if self.trade.retry_attempts == 0 {
            return Err(Error::Invalid("retry_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExchangeSettings {
    pub api_key_id: String,
    pub api_key_secret: String,
    /// The REST API base URL.
    pub base_url: String,
    /// Pause before every request, to stay under the exchange's rate ceiling.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Pause before every trade-history request. These trip the limit more easily.
    #[serde(default = "default_history_delay_ms")]
    pub history_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ExchangeSettings {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn history_delay(&self) -> Duration {
        Duration::from_millis(self.history_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LedgerSettings {
    /// The SQLite file holding pending position records.
    pub database_path: PathBuf,
    /// Directory for the JSON stats book.
    pub data_dir: PathBuf,
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TradeSettings {
    /// Asset codes to trade, e.g. `["XBT", "ETH"]`.
    pub assets: Vec<String>,
    /// The fiat currency every asset is traded against.
    pub currency: String,
    /// Fiat amount spent on one opening trade.
    pub purchase_unit: Decimal,
    /// Fractional gain required before a position is closed (0.03 = 3%).
    pub profit_margin: Decimal,
    #[serde(default = "default_snooze_period_mins")]
    pub snooze_period_mins: u64,
    #[serde(default)]
    pub random_snooze: bool,
    #[serde(default)]
    pub snooze_times_mins: Vec<u64>,
    #[serde(default)]
    pub trading_mode: TradingMode,
    /// Stop instead of retrying when the first connection attempt fails.
    #[serde(default)]
    pub exit_on_init_failure: bool,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Attempts for price, fee and history lookups within one round.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
    /// Consecutive ledger failures tolerated before the session stops.
    #[serde(default = "default_max_ledger_failures")]
    pub max_ledger_failures: u32,
    /// Name of the signal source to use. Falls back to the first registered one.
    #[serde(default)]
    pub analysis_plugin: Option<String>,
}

/// Parameters for each available signal source.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct StrategySettings {
    pub hermes: Option<HermesSettings>,
}

/// Helper functions for serde defaults
fn default_request_delay_ms() -> u64 { 600 }
fn default_history_delay_ms() -> u64 { 700 }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_history_entries() -> usize { 100 }
fn default_snooze_period_mins() -> u64 { 10 }
fn default_connect_retries() -> u32 { 3 }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_backoff_secs() -> u64 { 2 }
fn default_rate_limit_backoff_secs() -> u64 { 10 }
fn default_max_ledger_failures() -> u32 { 3 }
