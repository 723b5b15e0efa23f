//! Per-target outcomes and operation reports
//!
//! Every export, restore or import target produces exactly one outcome. An
//! operation never stops at a failed target; it records the failure and moves
//! on, so the report is the full picture of what happened.

use crate::target::ExportTarget;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Final status of a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    SkippedNoData,
    Failed(String),
}

impl OutcomeStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, OutcomeStatus::Failed(_))
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Completed => write!(f, "completed"),
            OutcomeStatus::SkippedNoData => write!(f, "skipped (no data)"),
            OutcomeStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Common view over the different outcome records.
pub trait Outcome {
    /// What the outcome is about, e.g. `plant.sales.orders`.
    fn subject(&self) -> String;

    fn status(&self) -> &OutcomeStatus;
}

/// Result of exporting one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub target: ExportTarget,
    pub artifact: Option<PathBuf>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl ExportOutcome {
    pub fn completed(target: ExportTarget, artifact: PathBuf) -> Self {
        Self {
            target,
            artifact: Some(artifact),
            status: OutcomeStatus::Completed,
        }
    }

    pub fn skipped(target: ExportTarget) -> Self {
        Self {
            target,
            artifact: None,
            status: OutcomeStatus::SkippedNoData,
        }
    }

    pub fn failed(target: ExportTarget, reason: impl Into<String>) -> Self {
        Self {
            target,
            artifact: None,
            status: OutcomeStatus::Failed(reason.into()),
        }
    }
}

impl Outcome for ExportOutcome {
    fn subject(&self) -> String {
        self.target.label()
    }

    fn status(&self) -> &OutcomeStatus {
        &self.status
    }
}

/// Row counters for a conflict-aware import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub applied: usize,
    pub failed: usize,
}

impl RowCounts {
    pub fn total(&self) -> usize {
        self.applied + self.failed
    }
}

/// Result of replaying one artifact (archive or snapshot CSV) into a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub database: String,
    pub source: PathBuf,
    /// `schema.table` for snapshot imports; `None` for whole-object restores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<RowCounts>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl RestoreOutcome {
    pub fn new(database: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            source: source.into(),
            table: None,
            rows: None,
            status: OutcomeStatus::Completed,
        }
    }

    pub fn with_table(mut self, schema: &str, table: &str) -> Self {
        self.table = Some(format!("{}.{}", schema, table));
        self
    }

    pub fn with_rows(mut self, rows: RowCounts) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_status(mut self, status: OutcomeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn failed(self, reason: impl Into<String>) -> Self {
        self.with_status(OutcomeStatus::Failed(reason.into()))
    }
}

impl Outcome for RestoreOutcome {
    fn subject(&self) -> String {
        let file = self
            .source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string());
        match &self.table {
            Some(table) => format!("{} -> {}.{}", file, self.database, table),
            None => format!("{} -> {}", file, self.database),
        }
    }

    fn status(&self) -> &OutcomeStatus {
        &self.status
    }
}

/// Result of a drop (schema or table) maintenance action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceOutcome {
    pub object: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl Outcome for MaintenanceOutcome {
    fn subject(&self) -> String {
        self.object.clone()
    }

    fn status(&self) -> &OutcomeStatus {
        &self.status
    }
}

/// Status of one trigger guard check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum GuardStatus {
    Created,
    AlreadyPresent,
    Failed(String),
}

impl fmt::Display for GuardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardStatus::Created => write!(f, "created"),
            GuardStatus::AlreadyPresent => write!(f, "already present"),
            GuardStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of ensuring one trigger exists after a restore.
///
/// Kept apart from restore outcomes: a guard failure never changes the
/// status already recorded for the restore itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardOutcome {
    pub trigger: String,
    #[serde(flatten)]
    pub status: GuardStatus,
}

/// Aggregate counts over a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeSummary {
    pub fn from_outcomes<T: Outcome>(outcomes: &[T]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome.status() {
                OutcomeStatus::Completed => summary.completed += 1,
                OutcomeStatus::SkippedNoData => summary.skipped += 1,
                OutcomeStatus::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} skipped, {} failed",
            self.completed, self.skipped, self.failed
        )
    }
}

/// Everything one user-initiated operation produced.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport<T: Outcome> {
    pub operation: String,
    pub outcomes: Vec<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guard: Vec<GuardOutcome>,
}

impl<T: Outcome> OperationReport<T> {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            outcomes: Vec::new(),
            guard: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: T) {
        self.outcomes.push(outcome);
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary::from_outcomes(&self.outcomes)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn guard_failed(&self) -> bool {
        self.guard
            .iter()
            .any(|g| matches!(g.status, GuardStatus::Failed(_)))
    }
}
