//! pf-ops - Backup/restore orchestration for pgferry
//!
//! Leaves first:
//! - [`process`]: supervised subprocesses with failure classification
//! - [`presence`]: bounded "does this window have rows" probe
//! - [`planner`]: per-table export plan for a time window
//! - [`dump`]: command lines for pg_dump, psql `\copy` and restores
//! - [`csv_import`]: conflict-aware replay of snapshot CSV files
//! - [`guard`]: post-restore trigger guard
//! - [`orchestrator`]: one operation at a time, aggregated into a report

pub mod csv_import;
pub mod dump;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod planner;
pub mod presence;
pub mod process;

#[cfg(test)]
pub(crate) mod test_support;

pub use csv_import::{ColumnCoercionRule, ConflictAwareCsvImporter, ImportPlan, SnapshotFile};
pub use dump::DumpInvoker;
pub use error::{OpsError, OpsResult};
pub use guard::SchemaMigrationGuard;
pub use orchestrator::{OperationPhase, Orchestrator, OpsSettings};
pub use planner::{ExportPlan, FilteredExportPlanner, PlannedExport};
pub use presence::DataPresenceChecker;
pub use process::{
    CommandRunner, FailurePolicy, ProcessError, ProcessInvocation, ProcessOutput, ProcessRunner,
};
