// In crates/api-client/src/gateway.rs

use crate::Result;
use crate::types::{AccountIds, Balance, FeeInfo, OrderSize, Ticker};
use async_trait::async_trait;
use core_types::{OrderDetails, OrderSide, Pair};
use rust_decimal::Decimal;
use std::time::Duration;

/// The operations the trading loop needs from an exchange.
///
/// Implementations apply their own rate limiting and request timeouts. Every
/// method may block for at least the configured request delay.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn current_price(&self, pair: &Pair) -> Result<Ticker>;

    /// `count` historical prices spaced `interval` apart, oldest first.
    async fn previous_prices(
        &self,
        pair: &Pair,
        count: usize,
        interval: Duration,
    ) -> Result<Vec<Decimal>>;

    async fn fee_info(&self, pair: &Pair) -> Result<FeeInfo>;

    /// Places a market order and returns the exchange's order id.
    async fn place_market_order(
        &self,
        pair: &Pair,
        side: OrderSide,
        size: OrderSize,
        accounts: &AccountIds,
    ) -> Result<String>;

    async fn check_order(&self, order_id: &str) -> Result<OrderDetails>;

    async fn balances(&self, assets: &[String]) -> Result<Vec<Balance>>;

    /// Recent orders on `pair`, in whatever order the exchange returns them.
    async fn list_orders(&self, pair: &Pair) -> Result<Vec<OrderDetails>>;

    /// Asks the exchange to stop a pending order. `Ok(false)` if it refused.
    async fn cancel_order(&self, order_id: &str) -> Result<bool>;
}
