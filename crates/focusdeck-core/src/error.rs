//! Core error types for focusdeck-core.
//!
//! Persistence *load* failures are deliberately not represented here: a
//! missing or corrupt state blob falls back to defaults (see
//! [`crate::storage::StateStore::load`]). Errors below cover writes and the
//! outbound Task Service calls.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusdeck-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Durable-store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Task Service reporter errors
    #[error("Reporter error: {0}")]
    Reporter(#[from] ReporterError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Durable-store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// State blob could not be serialized for writing
    #[error("Failed to encode state blob for key '{key}': {source}")]
    EncodeFailed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Database is locked
    #[error("Store is locked")]
    Locked,
}

/// Task Service reporter errors.
#[derive(Error, Debug)]
pub enum ReporterError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Task Service answered with a non-success status
    #[error("Task Service returned HTTP {status} for {operation}")]
    UnexpectedStatus { operation: String, status: u16 },

    /// Base URL could not be parsed
    #[error("Invalid Task Service base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
