//! Core error types for fastquest-core.
//!
//! Validation failures (`InvalidTransition`, `InvalidTarget`) are local and
//! leave engine state untouched. Store failures are never fatal: callers fall
//! back to defaults on load and keep in-memory state on save.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for fastquest-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An operation was attempted from a state that disallows it.
    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: String,
    },

    /// Target duration must be a positive number of hours.
    #[error("Invalid target duration: {hours}h (must be at least 1 hour)")]
    InvalidTarget { hours: u32 },

    /// The persistence collaborator failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Achievement catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored record could not be decoded.
    #[error("Corrupt record for '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// No data directory could be prepared.
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Achievement catalog validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog contains no achievements")]
    Empty,

    #[error("Achievement id must not be empty")]
    EmptyId,

    #[error("Duplicate achievement id: {0}")]
    DuplicateId(String),

    #[error("Achievement '{0}' must reward at least one point")]
    ZeroReward(String),

    #[error("Achievement '{0}' must have a threshold of at least one")]
    ZeroThreshold(String),

    #[error("Failed to parse catalog: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseBusy => {
                StoreError::Locked
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
