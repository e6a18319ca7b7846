// --- Session Event Structures ---

use chrono::{DateTime, Utc};
use core_types::PositionRecord;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// A log line forwarded to listeners (a terminal UI, a status page).
#[derive(Debug, Clone, Serialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Where the session controller currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Initializing,
    Connected,
    RoundRunning,
    Snoozing,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Initializing => "initializing",
            SessionState::Connected => "connected",
            SessionState::RoundRunning => "round running",
            SessionState::Snoozing => "snoozing",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Everything a running session reports to the outside.
///
/// `tag` and `content` are used by serde for clean JSON representation.
/// `Stopped` is always the last event of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    Log(LogMessage),
    StateChanged(SessionState),
    PositionOpened(PositionRecord),
    PositionClosed {
        record: PositionRecord,
        close_order_id: String,
        close_price: Decimal,
    },
    Error(String),
    Stopped,
}
