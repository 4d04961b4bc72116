//! Common error types for pgap

use thiserror::Error;

/// Common result type for pgap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the pgap crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected operation (duplicate department, locked assessment, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate of an existing entity (e.g. department name)
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Remote store could not be reached
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// No local cache backend in this environment
    #[error("Local cache is not available in this environment")]
    CacheUnavailable,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that mean the remote tier is unreachable rather than
    /// that the request itself was bad
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::RemoteUnavailable(_) => true,
            #[cfg(feature = "sqlx")]
            Error::Database(db_err) => matches!(
                db_err,
                sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}
