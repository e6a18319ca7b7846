// In crates/risk/src/simple_manager.rs

use crate::types::{MarketSnapshot, OrderPlan, SizingSettings};
use crate::{Error, Result, RiskManager, adjusted_purchase_unit};
use core_types::{AssetInfo, OrderType, Signal};
use rust_decimal::Decimal;

/// Sizes every opening order at one fee-adjusted purchase unit.
///
/// Rules:
/// 1. A long needs a fiat balance covering the adjusted unit. A short has no
///    balance check, the asset is sold now and bought back later.
/// 2. Volume is the adjusted unit divided by the current price, floored for
///    assets that only trade in whole units.
#[derive(Debug)]
pub struct SimpleRiskManager {
    settings: SizingSettings,
}

impl SimpleRiskManager {
    pub fn new(settings: SizingSettings) -> Result<Self> {
        if settings.purchase_unit <= Decimal::ZERO {
            return Err(Error::InvalidParameters(format!(
                "purchase unit must be positive, got {}",
                settings.purchase_unit
            )));
        }
        Ok(Self { settings })
    }

    pub fn purchase_unit(&self) -> Decimal {
        self.settings.purchase_unit
    }
}

impl RiskManager for SimpleRiskManager {
    fn name(&self) -> &'static str {
        "SimpleRiskManager"
    }

    fn check_minimum(&self, asset: &AssetInfo, price: Decimal) -> Result<()> {
        if self.settings.purchase_unit < asset.min_order_volume * price {
            return Err(Error::BelowMinimumVolume {
                asset: asset.code.to_string(),
                purchase_unit: self.settings.purchase_unit,
                min_volume: asset.min_order_volume,
                price,
            });
        }
        Ok(())
    }

    fn evaluate(
        &self,
        signal: Signal,
        asset: &AssetInfo,
        market: &MarketSnapshot,
    ) -> Result<Option<OrderPlan>> {
        let order_type = match signal {
            Signal::Wait => return Ok(None),
            Signal::GoLong => OrderType::Long,
            Signal::ShortSell => OrderType::Short,
        };

        if market.price <= Decimal::ZERO {
            return Err(Error::InvalidParameters(format!(
                "price must be positive, got {}",
                market.price
            )));
        }

        let adjusted_unit = adjusted_purchase_unit(self.settings.purchase_unit, market.taker_fee);

        if order_type == OrderType::Long && market.fiat_balance < adjusted_unit {
            return Err(Error::Vetoed {
                reason: format!(
                    "balance {} is below the fee-adjusted purchase unit {}",
                    market.fiat_balance, adjusted_unit
                ),
            });
        }

        let volume = asset.tradable_volume(adjusted_unit / market.price);
        if volume.is_zero() {
            return Err(Error::Vetoed {
                reason: format!("{} rounds to a zero {} volume", adjusted_unit, asset.code),
            });
        }

        Ok(Some(OrderPlan {
            order_type,
            side: order_type.opening_side(),
            price: market.price,
            volume,
            cost: volume * market.price,
            adjusted_unit,
        }))
    }
}
