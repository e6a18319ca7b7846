// In crates/api-client/src/error.rs

use thiserror::Error;

/// How the caller should react to a failed exchange call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network blips, timeouts, exchange-side 5xx. Retry.
    Transient,
    /// The exchange's request-rate ceiling was hit. Retry after a backoff.
    RateLimited,
    /// Missing, invalid or revoked credentials.
    Authorization,
    /// The exchange understood the request and refused it, e.g. insufficient balance.
    Rejected,
    /// The request or the response did not have the expected shape.
    Malformed,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to build the API client: {0}")]
    ClientBuildError(String),
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
    #[error("API error: status {status}, code {code}, msg: {msg}")]
    ApiError { status: u16, code: String, msg: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The order book has no usable price right now.
    #[error("No market: {0}")]
    NoMarket(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ClientBuildError(_) => ErrorKind::Malformed,
            Error::RequestFailed(e) => {
                if e.is_builder() || e.is_decode() {
                    ErrorKind::Malformed
                } else {
                    ErrorKind::Transient
                }
            }
            Error::DeserializationFailed(_) | Error::InvalidResponse(_) => ErrorKind::Malformed,
            Error::NoMarket(_) => ErrorKind::Transient,
            Error::ApiError { status, code, .. } => classify(*status, code),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::RateLimited)
    }

    /// Errors no retry or later round can fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Authorization | ErrorKind::Malformed)
    }
}

/// Maps an exchange error response to an [`ErrorKind`].
pub fn classify(status: u16, code: &str) -> ErrorKind {
    match (status, code) {
        (429, _) | (_, "ErrTooManyRequests") => ErrorKind::RateLimited,
        (401 | 403, _) | (_, "ErrAPIKeyNotFound" | "ErrAPIKeyRevoked" | "ErrUnauthorised") => {
            ErrorKind::Authorization
        }
        (_, c) if c.starts_with("ErrInvalid") => ErrorKind::Malformed,
        (500..=599, _) => ErrorKind::Transient,
        _ => ErrorKind::Rejected,
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: &str) -> Error {
        Error::ApiError { status, code: code.into(), msg: String::new() }
    }

    #[test]
    fn credential_errors_are_fatal() {
        assert_eq!(api(401, "").kind(), ErrorKind::Authorization);
        assert!(api(400, "ErrAPIKeyRevoked").is_fatal());
        assert!(!api(400, "ErrAPIKeyRevoked").is_retryable());
    }

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert_eq!(api(429, "").kind(), ErrorKind::RateLimited);
        assert!(api(429, "").is_retryable());
        assert!(api(503, "").is_retryable());
    }

    #[test]
    fn business_refusals_are_neither_fatal_nor_retryable() {
        let e = api(400, "ErrInsufficientBalance");
        assert_eq!(e.kind(), ErrorKind::Rejected);
        assert!(!e.is_fatal());
        assert!(!e.is_retryable());
    }

    #[test]
    fn invalid_arguments_are_malformed() {
        assert_eq!(api(400, "ErrInvalidArguments").kind(), ErrorKind::Malformed);
        assert!(Error::InvalidResponse("no price".into()).is_fatal());
    }

    #[test]
    fn empty_order_book_is_transient() {
        let e = Error::NoMarket("no ask".into());
        assert_eq!(e.kind(), ErrorKind::Transient);
        assert!(!e.is_fatal());
        assert!(e.is_retryable());
    }
}
