// In crates/strategies/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Not enough price data: needed at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Price {0} cannot be used for analysis")]
    InvalidPrice(String),

    #[error("Invalid indicator parameter: {0}")]
    InvalidParameter(String),

    #[error("A signal source named '{0}' is already registered")]
    DuplicateSource(String),

    #[error("No signal source named '{0}' is registered")]
    UnknownSource(String),

    #[error("No signal sources are registered")]
    NoSources,
}

pub type Result<T> = std::result::Result<T, Error>;
