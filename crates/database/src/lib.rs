// In crates/database/src/lib.rs

use app_config::LedgerSettings;

pub mod error;
pub mod ledger;
pub mod stats;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use ledger::{Ledger, LedgerHandle};
pub use stats::{AssetStats, StatsBook};

/// Builds the ledger and the stats book described by `settings`.
///
/// Nothing is opened here. The ledger connects per operation and the stats
/// book reads its files on demand.
pub fn stores(settings: &LedgerSettings) -> (Ledger, StatsBook) {
    (
        Ledger::new(&settings.database_path),
        StatsBook::new(&settings.data_dir, settings.max_history_entries),
    )
}
