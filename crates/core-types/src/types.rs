// In crates/core-types/src/types.rs

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A traded currency pair, e.g. `XBT` quoted in `NGN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    /// The crypto asset being bought and sold.
    pub base: String,
    /// The fiat (counter) currency the asset is priced in.
    pub counter: String,
}

impl Pair {
    pub fn new(base: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            counter: counter.into().to_uppercase(),
        }
    }

    /// The exchange's pair code, e.g. `XBTNGN`.
    pub fn code(&self) -> String {
        format!("{}{}", self.base, self.counter)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.counter)
    }
}

/// The kind of round trip a position record tracks.
///
/// A `Long` buys now and sells later above the trigger price. A `Short` sells now
/// and buys back later below the trigger price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Long,
    Short,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Long => "LONG_TRADE",
            OrderType::Short => "SHORT_TRADE",
        }
    }

    /// The market side of the leg that opens the position.
    pub fn opening_side(&self) -> OrderSide {
        match self {
            OrderType::Long => OrderSide::Buy,
            OrderType::Short => OrderSide::Sell,
        }
    }

    /// The market side of the leg that closes the position.
    pub fn closing_side(&self) -> OrderSide {
        match self {
            OrderType::Long => OrderSide::Sell,
            OrderType::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LONG_TRADE" => Ok(OrderType::Long),
            "SHORT_TRADE" => Ok(OrderType::Short),
            other => Err(Error::UnknownOrderType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl FromStr for OrderSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Limit orders are reported as BID/ASK, market orders as BUY/SELL.
        match s {
            "BUY" | "BID" => Ok(OrderSide::Buy),
            "SELL" | "ASK" => Ok(OrderSide::Sell),
            other => Err(Error::UnknownOrderSide(other.to_string())),
        }
    }
}

/// The exchange's view of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    #[default]
    Pending,
    Complete,
    Unknown,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "PENDING",
            OrderState::Complete => "COMPLETE",
            OrderState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for OrderState {
    fn from(s: &str) -> Self {
        match s {
            "PENDING" => OrderState::Pending,
            "COMPLETE" => OrderState::Complete,
            _ => OrderState::Unknown,
        }
    }
}

/// The recommendation a signal source emits for one asset in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Wait,
    GoLong,
    ShortSell,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Wait => "WAIT",
            Signal::GoLong => "GO_LONG",
            Signal::ShortSell => "SHORT_SELL",
        };
        f.write_str(s)
    }
}

/// How a signal source interprets a price trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    /// Expects a trend to reverse.
    #[default]
    Contrarian,
    /// Expects a trend to continue.
    TrendFollowing,
}

/// Details of an order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_id: String,
    pub side: Option<OrderSide>,
    pub state: OrderState,
    /// Filled volume of the base asset.
    pub base: Decimal,
    /// Filled amount of the counter currency.
    pub counter: Decimal,
    pub fee_base: Decimal,
    pub fee_counter: Decimal,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A position opened by the bot and tracked in the ledger until it is closed.
///
/// `order_type` and `trigger_price` are fixed at creation. The close fields are
/// only populated once a closing order has been placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Exchange-assigned id of the opening order.
    pub id: String,
    pub asset: String,
    pub counter_currency: String,
    pub order_type: OrderType,
    pub open_price: Decimal,
    pub open_volume: Decimal,
    pub open_cost: Decimal,
    pub open_timestamp: DateTime<Utc>,
    pub trigger_price: Decimal,
    pub close_order_id: Option<String>,
    pub close_timestamp: Option<DateTime<Utc>>,
    /// Set just before a closing order is sent; cleared again if the exchange refuses it.
    pub close_attempted_at: Option<DateTime<Utc>>,
    pub closed: bool,
    pub status: OrderState,
    pub asset_fee: Decimal,
    pub counter_fee: Decimal,
}

impl PositionRecord {
    /// Creates the record for an opening order that the exchange accepted.
    pub fn open(
        pair: &Pair,
        id: impl Into<String>,
        order_type: OrderType,
        price: Decimal,
        volume: Decimal,
        timestamp: DateTime<Utc>,
        profit_margin: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            asset: pair.base.clone(),
            counter_currency: pair.counter.clone(),
            order_type,
            open_price: price,
            open_volume: volume,
            open_cost: price * volume,
            open_timestamp: timestamp,
            trigger_price: Self::trigger_price_for(order_type, price, profit_margin),
            close_order_id: None,
            close_timestamp: None,
            close_attempted_at: None,
            closed: false,
            status: OrderState::Pending,
            asset_fee: Decimal::ZERO,
            counter_fee: Decimal::ZERO,
        }
    }

    /// `price * (1 + margin)` for a long, `price * (1 - margin)` for a short.
    pub fn trigger_price_for(order_type: OrderType, price: Decimal, margin: Decimal) -> Decimal {
        match order_type {
            OrderType::Long => price + price * margin,
            OrderType::Short => price - price * margin,
        }
    }

    /// Whether `current_price` has crossed the trigger price in the profitable direction.
    pub fn is_viable(&self, current_price: Decimal) -> bool {
        match self.order_type {
            OrderType::Long => current_price >= self.trigger_price,
            OrderType::Short => current_price <= self.trigger_price,
        }
    }

    /// Pending records are neither closed nor waiting on an in-flight close.
    pub fn is_pending(&self) -> bool {
        !self.closed && self.close_attempted_at.is_none()
    }

    /// Folds the exchange's settlement figures into the record.
    ///
    /// Only volume, cost, fees and status move; the open price and trigger price stay
    /// as computed when the order was placed.
    pub fn apply_settlement(&mut self, details: &OrderDetails) {
        self.status = details.state;
        if details.state != OrderState::Complete || details.base.is_zero() {
            return;
        }
        self.open_volume = details.base;
        self.open_cost = details.counter;
        self.asset_fee = details.fee_base;
        self.counter_fee = details.fee_counter;
    }
}

/// The outcome of one completed round trip, used for the stats book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitEntry {
    pub asset: String,
    pub order_id: String,
    pub timestamp: DateTime<Utc>,
    pub purchase_price: Decimal,
    pub purchase_volume: Decimal,
    pub purchase_cost: Decimal,
    pub sale_price: Decimal,
    pub sale_volume: Decimal,
    pub sale_cost: Decimal,
    pub profit: Decimal,
}

impl ProfitEntry {
    pub fn new(
        asset: impl Into<String>,
        order_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        purchase_price: Decimal,
        purchase_volume: Decimal,
        sale_price: Decimal,
        sale_volume: Decimal,
    ) -> Self {
        let purchase_cost = purchase_price * purchase_volume;
        let sale_cost = sale_price * sale_volume;
        Self {
            asset: asset.into(),
            order_id: order_id.into(),
            timestamp,
            purchase_price,
            purchase_volume,
            purchase_cost,
            sale_price,
            sale_volume,
            sale_cost,
            profit: sale_cost - purchase_cost,
        }
    }

    /// The entry for closing `record` at `close_price` with order `close_order_id`.
    pub fn for_close(
        record: &PositionRecord,
        close_order_id: &str,
        close_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let volume = record.open_volume;
        match record.order_type {
            // Bought at the open price, sold now.
            OrderType::Long => Self::new(
                &record.asset,
                close_order_id,
                timestamp,
                record.open_price,
                volume,
                close_price,
                volume,
            ),
            // Sold at the open price, bought back now.
            OrderType::Short => Self::new(
                &record.asset,
                close_order_id,
                timestamp,
                close_price,
                volume,
                record.open_price,
                volume,
            ),
        }
    }
}
