// In crates/strategies/src/lib.rs

use core_types::Signal;
use rust_decimal::Decimal;
use std::time::Duration;

pub mod error;
pub mod factory;
pub mod hermes;
pub mod types;

pub use error::{Error, Result};
pub use factory::{SignalRegistry, default_registry};
pub use hermes::Hermes;

/// The interface every signal source implements.
///
/// A source is stateful: `analyze` digests a price history and `emit` reports the
/// signal derived from the most recent analysis. The caller asks for the history
/// it needs through `price_dimensions`.
pub trait SignalSource: Send + Sync {
    /// The name the source is registered under.
    fn name(&self) -> &'static str;

    /// How many historical prices to fetch, and the spacing between them.
    fn price_dimensions(&self) -> (usize, Duration);

    /// Digests `prices`, ordered oldest first with the current price last.
    fn analyze(&mut self, prices: &[Decimal]) -> Result<()>;

    /// The signal from the last successful `analyze`. `Wait` if there was none.
    fn emit(&self) -> Signal;
}
