// In crates/database/src/stats.rs

use crate::Result;
use chrono::{DateTime, Utc};
use core_types::{OrderType, ProfitEntry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SALES_FILE: &str = "sales.json";
const PURCHASES_FILE: &str = "purchases.json";

/// All-time totals for one asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetStats {
    pub asset: String,
    pub purchase_volume: Decimal,
    pub purchase_cost: Decimal,
    pub sale_volume: Decimal,
    pub sale_cost: Decimal,
    pub profit: Decimal,
    pub trades: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AssetStats {
    fn accumulate(&mut self, entry: &ProfitEntry) {
        self.purchase_volume += entry.purchase_volume;
        self.purchase_cost += entry.purchase_cost;
        self.sale_volume += entry.sale_volume;
        self.sale_cost += entry.sale_cost;
        self.profit += entry.profit;
        self.trades += 1;
        self.updated_at = Some(entry.timestamp);
    }
}

/// JSON files recording the outcome of every closed position.
///
/// `<asset>-stats.json` keeps running totals per asset. `sales.json` (closed
/// longs) and `purchases.json` (closed shorts) keep the most recent entries,
/// oldest dropped first.
#[derive(Debug, Clone)]
pub struct StatsBook {
    data_dir: PathBuf,
    max_history: usize,
}

impl StatsBook {
    pub fn new(data_dir: impl Into<PathBuf>, max_history: usize) -> Self {
        Self { data_dir: data_dir.into(), max_history }
    }

    fn stats_path(&self, asset: &str) -> PathBuf {
        self.data_dir.join(format!("{}-stats.json", asset.to_lowercase()))
    }

    /// Adds a closed position to the asset totals and the matching history list.
    pub fn record_close(&self, entry: &ProfitEntry, order_type: OrderType) -> Result<AssetStats> {
        fs::create_dir_all(&self.data_dir)?;

        let path = self.stats_path(&entry.asset);
        let mut stats: AssetStats = read_json(&path)?.unwrap_or_default();
        stats.asset = entry.asset.clone();
        stats.accumulate(entry);
        write_json(&path, &stats)?;

        let history = match order_type {
            OrderType::Long => SALES_FILE,
            OrderType::Short => PURCHASES_FILE,
        };
        let path = self.data_dir.join(history);
        let mut entries: Vec<ProfitEntry> = read_json(&path)?.unwrap_or_default();
        entries.push(entry.clone());
        if entries.len() > self.max_history {
            let excess = entries.len() - self.max_history;
            entries.drain(..excess);
        }
        write_json(&path, &entries)?;

        debug!(asset = %entry.asset, profit = %entry.profit, total = %stats.profit, "Stats updated");
        Ok(stats)
    }

    /// Totals for `asset`, or `None` before its first closed position.
    pub fn stats(&self, asset: &str) -> Result<Option<AssetStats>> {
        read_json(&self.stats_path(asset))
    }

    /// Most recent closed longs, oldest first.
    pub fn sales(&self) -> Result<Vec<ProfitEntry>> {
        Ok(read_json(&self.data_dir.join(SALES_FILE))?.unwrap_or_default())
    }

    /// Most recent closed shorts, oldest first.
    pub fn purchases(&self) -> Result<Vec<ProfitEntry>> {
        Ok(read_json(&self.data_dir.join(PURCHASES_FILE))?.unwrap_or_default())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&text)?))
}

/// Writes through a temporary file so a crash never leaves half a document.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
