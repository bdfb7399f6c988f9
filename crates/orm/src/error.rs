//! Error types for the migration engine
//!
//! Distinguishes failures that abort a whole invocation (connection, ledger,
//! lock) from failures that only end the current step.

use thiserror::Error;

/// Result type alias for engine operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database, migration and seeding operations
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Database connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement was rejected by the backend
    #[error("Query error: {0}")]
    Query(String),

    /// Migration bookkeeping error (ledger unreadable, inconsistent state)
    #[error("Migration error: {0}")]
    Migration(String),

    /// No unit is registered under the requested identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another runner holds the migration lock
    #[error("Migration lock is held by {owner} (acquired at {acquired_at})")]
    Locked { owner: String, acquired_at: String },

    /// Input rejected before touching the database
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid configuration or registration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A column value could not be converted
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                OrmError::Connection(err.to_string())
            }
            sqlx::Error::RowNotFound => OrmError::NotFound(err.to_string()),
            _ => OrmError::Query(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}
