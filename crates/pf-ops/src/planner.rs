//! Per-table plan for a time-filtered export

use crate::presence::DataPresenceChecker;
use pf_core::{ExportTarget, TimeWindow};

/// What to do with one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedExport {
    /// Has rows in the window; hand it to the dump invoker
    Export(ExportTarget),
    /// No rows in the window (or the probe failed); never exported
    Skip(ExportTarget),
}

impl PlannedExport {
    pub fn target(&self) -> &ExportTarget {
        match self {
            PlannedExport::Export(t) | PlannedExport::Skip(t) => t,
        }
    }
}

/// Ordered plan, one entry per considered table, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportPlan {
    pub items: Vec<PlannedExport>,
}

impl ExportPlan {
    /// True when there was nothing to consider at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn exports(&self) -> impl Iterator<Item = &ExportTarget> {
        self.items.iter().filter_map(|item| match item {
            PlannedExport::Export(t) => Some(t),
            PlannedExport::Skip(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ExportTarget> {
        self.items.iter().filter_map(|item| match item {
            PlannedExport::Skip(t) => Some(t),
            PlannedExport::Export(_) => None,
        })
    }
}

pub struct FilteredExportPlanner {
    checker: DataPresenceChecker,
}

impl FilteredExportPlanner {
    pub fn new(checker: DataPresenceChecker) -> Self {
        Self { checker }
    }

    /// Probe each table in turn. Tables are never re-sorted.
    pub async fn plan(
        &self,
        database: &str,
        schema: &str,
        window: TimeWindow,
        tables: &[String],
    ) -> ExportPlan {
        let mut plan = ExportPlan::default();
        for table in tables {
            let target = ExportTarget::filtered(database, schema, table.as_str(), window);
            let item = if self
                .checker
                .has_rows(database, schema, table, &window)
                .await
            {
                PlannedExport::Export(target)
            } else {
                PlannedExport::Skip(target)
            };
            plan.items.push(item);
        }
        plan
    }
}
