//! pf-core - Core library for pgferry
//!
//! This crate provides the shared types used by every pgferry component:
//! export targets and time windows, per-target outcomes, configuration
//! parsing for `pgferry.yml`, SQL identifier quoting, and the append-only
//! operation log.

pub mod config;
pub mod error;
pub mod oplog;
pub mod outcome;
pub mod sql_utils;
pub mod target;

pub use config::{
    Config, ConnectionConfig, ConnectionSettings, DbType, DumpFormat, ExportConfig, GuardConfig,
    ImportConfig, RestoreConfig, Secret, Tool, ToolsConfig, TriggerDefinition,
    PASSWORD_CHILD_ENV_VAR,
};
pub use error::{CoreError, CoreResult};
pub use oplog::OperationLog;
pub use outcome::{
    ExportOutcome, GuardOutcome, GuardStatus, MaintenanceOutcome, OperationReport, Outcome,
    OutcomeStatus, OutcomeSummary, RestoreOutcome, RowCounts,
};
pub use target::{ExportTarget, TimeWindow};
