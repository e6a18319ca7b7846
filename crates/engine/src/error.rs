// In crates/engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("The trading session was cancelled")]
    Cancelled,

    /// Nothing the session can do will fix this: bad credentials, a malformed
    /// request, a purchase unit below every asset's minimum.
    #[error("Fatal error: {0}")]
    Fatal(String),

    #[error("Exchange call failed: {0}")]
    Exchange(#[source] api_client::Error),

    #[error("Ledger failure: {0}")]
    Ledger(#[from] database::Error),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] strategies::Error),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }

    /// Errors that end the session rather than the current step.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Fatal(_) | Error::Cancelled)
    }
}

impl From<api_client::Error> for Error {
    fn from(e: api_client::Error) -> Self {
        if e.is_fatal() {
            Error::Fatal(e.to_string())
        } else {
            Error::Exchange(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
