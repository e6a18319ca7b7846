// In crates/risk/src/types.rs

use core_types::{OrderSide, OrderType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingSettings {
    /// Fiat amount spent on one opening trade, before fees.
    pub purchase_unit: Decimal,
}

/// Market figures fetched during the current round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub taker_fee: Decimal,
    /// Available balance in the counter (fiat) currency.
    pub fiat_balance: Decimal,
}

/// An approved opening order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub order_type: OrderType,
    pub side: OrderSide,
    pub price: Decimal,
    /// Base asset volume, already rounded to what the exchange accepts.
    pub volume: Decimal,
    /// Fiat value of `volume` at `price`.
    pub cost: Decimal,
    pub adjusted_unit: Decimal,
}
