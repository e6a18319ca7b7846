// In crates/database/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to open the ledger database: {0}")]
    ConnectionError(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Database operation failed: {0}")]
    OperationFailed(sqlx::Error),
    #[error("A record with id {0} is already in the ledger")]
    DuplicateRecord(String),
    #[error("Record {id} could not be read: {reason}")]
    CorruptRecord { id: String, reason: String },
    #[error("Stats file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stats file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
