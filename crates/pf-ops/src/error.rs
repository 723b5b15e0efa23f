//! Error types for pf-ops
//!
//! Only setup-level problems surface as errors. Per-target failures (a tool
//! that cannot be launched included), per-row and guard failures are recorded
//! in outcomes and never abort an operation.

use pf_core::CoreError;
use pf_db::DbError;
use thiserror::Error;

/// Orchestration errors
#[derive(Error, Debug)]
pub enum OpsError {
    /// P002: Snapshot file could not be read or parsed
    #[error("[P002] Failed to read snapshot '{path}': {message}")]
    SnapshotRead { path: String, message: String },

    /// P003: Snapshot header lacks the key column
    #[error("[P003] Snapshot '{path}' has no key column '{key_column}' (header: {header})")]
    MissingKeyColumn {
        path: String,
        key_column: String,
        header: String,
    },

    /// P004: Snapshot header names a column twice
    #[error("[P004] Snapshot '{path}' repeats column '{column}'")]
    DuplicateColumn { path: String, column: String },

    /// P005: Selected database does not exist
    #[error("[P005] Database '{database}' not found. Available: {available}")]
    UnknownDatabase { database: String, available: String },

    /// P006: Catalog unreachable or failing during setup
    #[error("[P006] Catalog query failed: {0}")]
    Catalog(#[from] DbError),

    /// Invalid selection (time window, file name, config)
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for OpsError
pub type OpsResult<T> = Result<T, OpsError>;
