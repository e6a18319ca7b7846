// In crates/risk/src/error.rs

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Trade signal was vetoed by risk manager: {reason}")]
    Vetoed { reason: String },

    #[error(
        "Purchase unit {purchase_unit} cannot buy the minimum order volume of {asset} ({min_volume}) at {price}"
    )]
    BelowMinimumVolume {
        asset: String,
        purchase_unit: Decimal,
        min_volume: Decimal,
        price: Decimal,
    },

    #[error("Invalid risk parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, Error>;
