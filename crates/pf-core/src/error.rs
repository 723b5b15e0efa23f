//! Error types for pf-core

use chrono::NaiveDate;
use thiserror::Error;

/// Core error type for pgferry
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Failed to parse configuration file
    #[error("[C002] Failed to parse config {path}: {message}")]
    ConfigParseError { path: String, message: String },

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: Time window with start after end
    #[error("[C004] Invalid time window: start {start} is after end {end}")]
    InvalidTimeWindow { start: NaiveDate, end: NaiveDate },

    /// C005: Time window requested for a whole schema
    #[error("[C005] A time window needs a table; {database}.{schema} was given without one")]
    WindowWithoutTable { database: String, schema: String },

    /// C006: Snapshot file name does not carry schema and table tokens
    #[error("[C006] Invalid snapshot file name '{name}': expected <prefix>_<schema>_<table>[_<suffix>].csv")]
    InvalidSnapshotName { name: String },

    /// C007: IO error with file path context
    #[error("[C007] Failed to access '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
