// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown order type: {0}")]
    UnknownOrderType(String),

    #[error("Unknown order side: {0}")]
    UnknownOrderSide(String),

    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),
}

pub type Result<T> = std::result::Result<T, Error>;
