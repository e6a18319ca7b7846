// In crates/risk/src/lib.rs

use core_types::{AssetInfo, Signal};
use rust_decimal::Decimal;

pub mod error;
pub mod simple_manager;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use simple_manager::SimpleRiskManager;
pub use types::{MarketSnapshot, OrderPlan, SizingSettings};

/// The interface for a position sizing module.
///
/// A `RiskManager` decides whether a signal may turn into an opening order and,
/// if so, how large that order is.
pub trait RiskManager: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails with `BelowMinimumVolume` when one purchase unit cannot buy the
    /// exchange's smallest order of `asset` at `price`.
    fn check_minimum(&self, asset: &AssetInfo, price: Decimal) -> Result<()>;

    /// Turns a signal into an order plan.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(OrderPlan))`: the signal is approved and an opening order should be placed.
    /// * `Ok(None)`: nothing to open (a `Wait` signal).
    /// * `Err(Error::Vetoed)`: the order would break a sizing rule, e.g. the fiat balance is short.
    fn evaluate(
        &self,
        signal: Signal,
        asset: &AssetInfo,
        market: &MarketSnapshot,
    ) -> Result<Option<OrderPlan>>;
}

/// The purchase unit grossed up by the taker fee, so the asset received after
/// fees is still worth roughly one purchase unit.
pub fn adjusted_purchase_unit(purchase_unit: Decimal, taker_fee: Decimal) -> Decimal {
    purchase_unit + taker_fee * purchase_unit
}
