//! Common error types for the hotspot services

use thiserror::Error;

/// Common result type for hotspot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the clustering engine and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding of a stored column failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying database reported lock contention
    ///
    /// SQLite surfaces writer contention as "database is locked" (SQLITE_BUSY);
    /// callers use this to decide whether a retry is worthwhile.
    pub fn is_lock_contention(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(sqlx::Error::Database(db_err)) => {
                let message = db_err.message().to_ascii_lowercase();
                message.contains("database is locked") || message.contains("database table is locked")
            }
            _ => false,
        }
    }
}
