// In crates/strategies/src/hermes.rs

use crate::types::HermesSettings;
use crate::{Error, Result, SignalSource};
use core_types::{Signal, TradingMode};
use num_traits::cast::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::time::Duration;
use ta::Next;
use ta::indicators::ExponentialMovingAverage as Ema;
use tracing::debug;

/// Where the current price sits relative to the moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricePosition {
    Above,
    Below,
    #[default]
    Stable,
}

/// The default signal source.
///
/// Scores the direction of a price history (every rise between consecutive
/// prices counts +1, every fall -1) and locates the current price against an
/// EMA of the same history. The trading mode decides how the pair is read:
/// contrarian expects the trend to reverse, trend-following expects it to carry on.
#[derive(Debug)]
pub struct Hermes {
    settings: HermesSettings,
    mode: TradingMode,
    score: i64,
    position: PricePosition,
    analyzed: bool,
}

impl Hermes {
    pub const NAME: &'static str = "hermes";

    pub fn new(settings: HermesSettings, mode: TradingMode) -> Self {
        Self {
            settings,
            mode,
            score: 0,
            position: PricePosition::default(),
            analyzed: false,
        }
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn position(&self) -> PricePosition {
        self.position
    }

    fn trend_score(prices: &[f64]) -> i64 {
        prices
            .windows(2)
            .map(|w| match w[1].partial_cmp(&w[0]) {
                Some(Ordering::Greater) => 1,
                Some(Ordering::Less) => -1,
                _ => 0,
            })
            .sum()
    }

    fn moving_average(&self, prices: &[f64]) -> Result<f64> {
        let mut ema = Ema::new(self.settings.ema_period)
            .map_err(|e| Error::InvalidParameter(format!("ema_period: {e:?}")))?;
        let mut value = 0.0;
        for price in prices {
            value = ema.next(*price);
        }
        Ok(value)
    }
}

impl SignalSource for Hermes {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn price_dimensions(&self) -> (usize, Duration) {
        (self.settings.price_count, self.settings.interval())
    }

    fn analyze(&mut self, prices: &[Decimal]) -> Result<()> {
        self.analyzed = false;
        if prices.len() < 2 {
            return Err(Error::InsufficientData { needed: 2, got: prices.len() });
        }

        let series = prices
            .iter()
            .map(|p| p.to_f64().ok_or_else(|| Error::InvalidPrice(p.to_string())))
            .collect::<Result<Vec<f64>>>()?;

        let average = self.moving_average(&series)?;
        let current = series[series.len() - 1];

        self.score = Self::trend_score(&series);
        self.position = match current.partial_cmp(&average) {
            Some(Ordering::Greater) => PricePosition::Above,
            Some(Ordering::Less) => PricePosition::Below,
            _ => PricePosition::Stable,
        };
        self.analyzed = true;

        debug!(score = self.score, position = ?self.position, ema = average, "Hermes analysis complete");
        Ok(())
    }

    fn emit(&self) -> Signal {
        if !self.analyzed {
            return Signal::Wait;
        }
        use PricePosition::*;
        use TradingMode::*;
        match (self.score.signum(), self.position, self.mode) {
            // Downtrend.
            (-1, Above, Contrarian) => Signal::GoLong,
            (-1, Above, TrendFollowing) => Signal::ShortSell,
            (-1, Below, Contrarian) => Signal::ShortSell,
            (-1, Below, TrendFollowing) => Signal::GoLong,
            // Uptrend.
            (1, Above, Contrarian) => Signal::ShortSell,
            (1, Above, TrendFollowing) => Signal::GoLong,
            (1, Below, Contrarian) => Signal::GoLong,
            (1, Below, TrendFollowing) => Signal::ShortSell,
            _ => Signal::Wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings() -> HermesSettings {
        HermesSettings { price_count: 10, interval_mins: 5, ema_period: 5 }
    }

    fn rising() -> Vec<Decimal> {
        (1..=10).map(Decimal::from).collect()
    }

    fn falling() -> Vec<Decimal> {
        (1..=10).rev().map(Decimal::from).collect()
    }

    #[test]
    fn uptrend_above_average() {
        let mut follow = Hermes::new(settings(), TradingMode::TrendFollowing);
        follow.analyze(&rising()).unwrap();
        assert_eq!(follow.score(), 9);
        assert_eq!(follow.position(), PricePosition::Above);
        assert_eq!(follow.emit(), Signal::GoLong);

        let mut contra = Hermes::new(settings(), TradingMode::Contrarian);
        contra.analyze(&rising()).unwrap();
        assert_eq!(contra.emit(), Signal::ShortSell);
    }

    #[test]
    fn downtrend_below_average() {
        let mut follow = Hermes::new(settings(), TradingMode::TrendFollowing);
        follow.analyze(&falling()).unwrap();
        assert_eq!(follow.score(), -9);
        assert_eq!(follow.position(), PricePosition::Below);
        assert_eq!(follow.emit(), Signal::GoLong);

        let mut contra = Hermes::new(settings(), TradingMode::Contrarian);
        contra.analyze(&falling()).unwrap();
        assert_eq!(contra.emit(), Signal::ShortSell);
    }

    #[test]
    fn flat_prices_wait() {
        let mut hermes = Hermes::new(settings(), TradingMode::Contrarian);
        hermes.analyze(&[dec!(100), dec!(100), dec!(100)]).unwrap();
        assert_eq!(hermes.score(), 0);
        assert_eq!(hermes.emit(), Signal::Wait);
    }

    #[test]
    fn needs_history_before_emitting() {
        let mut hermes = Hermes::new(settings(), TradingMode::Contrarian);
        assert_eq!(hermes.emit(), Signal::Wait);
        assert_eq!(
            hermes.analyze(&[dec!(5)]),
            Err(Error::InsufficientData { needed: 2, got: 1 })
        );
        assert_eq!(hermes.emit(), Signal::Wait);
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut hermes = Hermes::new(
            HermesSettings { ema_period: 0, ..settings() },
            TradingMode::Contrarian,
        );
        assert!(matches!(hermes.analyze(&rising()), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn dimensions_follow_settings() {
        let hermes = Hermes::new(settings(), TradingMode::Contrarian);
        assert_eq!(hermes.price_dimensions(), (10, Duration::from_secs(300)));
    }
}
