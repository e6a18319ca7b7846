// In crates/api-client/src/lib.rs

pub mod error;
pub mod gateway;
pub mod luno;
pub mod rate_limit;
pub mod types;

// Re-export public types
pub use error::{Error, ErrorKind, Result};
pub use gateway::ExchangeGateway;
pub use luno::LunoClient;
pub use rate_limit::RateLimiter;
pub use types::{AccountIds, Balance, FeeInfo, OrderSize, Ticker};

/// Builds the REST client described by `settings`.
pub fn new(settings: &app_config::ExchangeSettings) -> Result<LunoClient> {
    LunoClient::new(settings)
}
