// In crates/api-client/src/types.rs

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use core_types::{OrderDetails, OrderSide, OrderState};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Top of the order book for a pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    pub ask: Decimal,
    pub bid: Decimal,
}

/// Trading fees charged on a pair for this account.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FeeInfo {
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub thirty_day_volume: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Balance {
    pub account_id: String,
    pub asset: String,
    pub balance: Decimal,
    #[serde(default)]
    pub reserved: Decimal,
}

impl Balance {
    pub fn available(&self) -> Decimal {
        self.balance - self.reserved
    }
}

/// How much a market order trades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSize {
    /// Amount of the base asset to sell or buy.
    Base(Decimal),
    /// Amount of the counter currency to spend.
    Counter(Decimal),
}

/// The pair of accounts an order moves funds between.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountIds {
    pub base: Option<String>,
    pub counter: Option<String>,
}

// --- Wire formats ---

#[derive(Debug, Deserialize)]
pub(crate) struct TickerResponse {
    pub ask: Decimal,
    pub bid: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TradesResponse {
    #[serde(default)]
    pub trades: Option<Vec<RawTrade>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTrade {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BalancesResponse {
    #[serde(default)]
    pub balance: Option<Vec<Balance>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostOrderResponse {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StopOrderResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListOrdersResponse {
    #[serde(default)]
    pub orders: Option<Vec<RawOrder>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOrder {
    pub order_id: String,
    #[serde(rename = "type", default)]
    pub side: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub base: Decimal,
    #[serde(default)]
    pub counter: Decimal,
    #[serde(default)]
    pub fee_base: Decimal,
    #[serde(default)]
    pub fee_counter: Decimal,
    #[serde(default)]
    pub creation_timestamp: i64,
    #[serde(default)]
    pub completed_timestamp: i64,
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

impl From<RawOrder> for OrderDetails {
    fn from(raw: RawOrder) -> Self {
        OrderDetails {
            side: raw.side.parse::<OrderSide>().ok(),
            state: OrderState::from(raw.state.as_str()),
            base: raw.base,
            counter: raw.counter,
            fee_base: raw.fee_base,
            fee_counter: raw.fee_counter,
            created_at: from_millis(raw.creation_timestamp),
            completed_at: from_millis(raw.completed_timestamp),
            order_id: raw.order_id,
        }
    }
}

/// Turns per-window trade lists into one price per window.
///
/// `windows` holds, oldest window first, the trades executed since each window's
/// start. A window's price is its earliest trade. A window without trades reuses
/// the previous window's price; leading windows without any price are dropped.
pub(crate) fn window_prices(windows: Vec<Vec<RawTrade>>) -> Vec<Decimal> {
    let mut prices = Vec::with_capacity(windows.len());
    let mut last: Option<Decimal> = None;
    for trades in windows {
        if let Some(first) = trades.iter().min_by_key(|t| t.timestamp) {
            last = Some(first.price);
        }
        if let Some(price) = last {
            prices.push(price);
        }
    }
    prices
}

/// Checks a response body for the exchange's `{error, error_code}` envelope.
pub(crate) fn check_body(status: u16, body: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if (200..300).contains(&status) => return Err(Error::DeserializationFailed(e)),
        Err(_) => {
            return Err(Error::ApiError {
                status,
                code: String::new(),
                msg: body.chars().take(200).collect(),
            });
        }
    };

    let code = value.get("error_code").and_then(|c| c.as_str());
    if !(200..300).contains(&status) || code.is_some_and(|c| !c.is_empty()) {
        let msg = value
            .get("error")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        return Err(Error::ApiError { status, code: code.unwrap_or_default().to_string(), msg });
    }
    Ok(value)
}
