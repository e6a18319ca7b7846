// In crates/core-types/src/asset.rs

use crate::{Error, Result};
use rust_decimal::Decimal;

/// Exchange trading rules for a supported asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInfo {
    pub code: &'static str,
    pub name: &'static str,
    /// The smallest volume the exchange accepts in one order.
    pub min_order_volume: Decimal,
    /// The exchange only trades whole units of this asset.
    pub whole_units_only: bool,
}

const CATALOG: &[(&str, &str, bool)] = &[
    ("XBT", "Bitcoin", false),
    ("ETH", "Ethereum", false),
    ("LTC", "Litecoin", false),
    ("BCH", "Bitcoin Cash", false),
    ("XRP", "Ripple Coin", true),
];

impl AssetInfo {
    /// Looks up the trading rules for an asset code such as `XBT`.
    pub fn lookup(code: &str) -> Result<Self> {
        let upper = code.to_uppercase();
        CATALOG
            .iter()
            .find(|(c, _, _)| *c == upper)
            .map(|&(code, name, whole_units_only)| AssetInfo {
                code,
                name,
                min_order_volume: if whole_units_only {
                    Decimal::ONE
                } else {
                    Decimal::new(5, 4)
                },
                whole_units_only,
            })
            .ok_or(Error::UnsupportedAsset(code.to_string()))
    }

    /// Rounds an order volume to what the exchange will accept for this asset.
    pub fn tradable_volume(&self, volume: Decimal) -> Decimal {
        if self.whole_units_only {
            volume.floor()
        } else {
            volume
        }
    }
}
