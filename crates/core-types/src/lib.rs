// In crates/core-types/src/lib.rs

pub mod asset;
pub mod error;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use asset::AssetInfo;
pub use error::{Error, Result};
pub use types::{
    OrderDetails, OrderSide, OrderState, OrderType, Pair, PositionRecord, ProfitEntry, Signal,
    TradingMode,
};
