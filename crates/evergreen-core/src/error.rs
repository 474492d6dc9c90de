//! Core error types for evergreen-core.
//!
//! Validation errors are surfaced to the caller for user-facing correction.
//! Persistence errors are caught at the ledger boundary and logged; they never
//! reach the caller of a ledger mutation.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for evergreen-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Rejected user input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Background save/load failures
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

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

/// Validation errors.
///
/// Raised synchronously before any state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Task title is empty after trimming
    #[error("Task title must not be empty")]
    EmptyTitle,

    /// Study hours are not a usable number
    #[error("Invalid study hours {hours}: {message}")]
    InvalidHours { hours: f64, message: String },

    /// Date is not `YYYY-MM-DD`
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// A block duration of zero seconds
    #[error("Invalid duration for '{field}': {value} seconds")]
    InvalidDuration { field: String, value: u64 },

    /// A lap count of zero, or more laps than a plan may hold
    #[error("Lap count must be between 1 and {max}", max = crate::timer::MAX_LAPS)]
    InvalidLapCount,

    /// No task with this id
    #[error("Unknown task: {id}")]
    UnknownTask { id: String },

    /// Points-per-stage threshold that is not a positive number
    #[error("Invalid points per stage: {value}")]
    InvalidThreshold { value: f64 },

    /// A scoring weight that is negative or not a number
    #[error("Invalid {signal} weight: {value}")]
    InvalidWeight { signal: String, value: f64 },

    /// Text that does not name a priority
    #[error("Unknown priority '{value}': expected low, medium or high")]
    InvalidPriority { value: String },
}

/// Ledger persistence errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to read or write the backing file
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The background writer thread panicked
    #[error("Background writer panicked")]
    WriterPanicked,

    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
