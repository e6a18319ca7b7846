// In crates/engine/src/lib.rs

pub mod client;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod reconciler;
pub mod retry;
pub mod session;

pub use client::AssetClient;
pub use context::SessionContext;
pub use error::{Error, Result};
pub use lifecycle::{LifecycleManager, RoundOutcome, RoundPrep, RoundReport};
pub use reconciler::{ReconcileReport, Reconciler};
pub use retry::{ConnectPolicy, RetryPolicy};
pub use session::{Session, snooze_duration};

/// Capacity of the session event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
