// In crates/strategies/src/factory.rs

use crate::types::HermesSettings;
use crate::{Error, Hermes, Result, SignalSource};
use core_types::TradingMode;

/// Signal sources available to a session, keyed by lowercase name.
///
/// Names are unique. The source used for trading is the configured one when a
/// name is given, otherwise whichever was registered first.
#[derive(Default)]
pub struct SignalRegistry {
    sources: Vec<(String, Box<dyn SignalSource>)>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, source: Box<dyn SignalSource>) -> Result<()> {
        let name = name.to_lowercase();
        if self.sources.iter().any(|(n, _)| *n == name) {
            return Err(Error::DuplicateSource(name));
        }
        self.sources.push((name, source));
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Removes and returns the source to trade with.
    pub fn select(mut self, configured: Option<&str>) -> Result<Box<dyn SignalSource>> {
        let index = match configured {
            Some(name) => {
                let name = name.to_lowercase();
                self.sources
                    .iter()
                    .position(|(n, _)| *n == name)
                    .ok_or(Error::UnknownSource(name))?
            }
            None if self.sources.is_empty() => return Err(Error::NoSources),
            None => 0,
        };
        Ok(self.sources.swap_remove(index).1)
    }
}

/// A registry holding every built-in source.
pub fn default_registry(hermes: Option<HermesSettings>, mode: TradingMode) -> Result<SignalRegistry> {
    let mut registry = SignalRegistry::new();
    registry.register(
        Hermes::NAME,
        Box::new(Hermes::new(hermes.unwrap_or_default(), mode)),
    )?;
    Ok(registry)
}
