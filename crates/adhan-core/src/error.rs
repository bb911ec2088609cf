//! Core error types for adhan-core.
//!
//! This module defines the error hierarchy using thiserror. Errors raised by
//! the collaborators (astronomical engine, alarm boundary, key/value store)
//! have their own enums so that the reprogram pipeline can map them onto the
//! structured [`RunError`](crate::reprogram::RunError) recorded on each run.

use std::path::PathBuf;
use thiserror::Error;

use crate::prayer::CalculationMethod;

/// Core error type for adhan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Astronomical engine rejected the request
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Alarm boundary errors
    #[error("Alarm boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// Key/value persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the astronomical prayer-time engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Coordinates are out of range, or the sun never rises/sets there on that day
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// The engine does not implement this calculation convention
    #[error("Unsupported calculation method: {0}")]
    UnsupportedMethod(CalculationMethod),
}

/// Failures of the native alarm boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundaryError {
    /// The boundary cannot be used at all (e.g. notification permission revoked)
    #[error("Alarm boundary unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// Stored value could not be decoded
    #[error("Corrupt value for key '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Could not determine or create the data directory
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Prayer instants out of canonical order
    #[error("Prayer times out of order on {date}: {earlier} must precede {later}")]
    PrayerOrder {
        date: chrono::NaiveDate,
        earlier: &'static str,
        later: &'static str,
    },

    /// Coordinates outside valid ranges
    #[error("Coordinates out of range: latitude {latitude}, longitude {longitude}")]
    CoordinatesOutOfRange { latitude: f64, longitude: f64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::InvalidLocation(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
