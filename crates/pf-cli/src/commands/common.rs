//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use pf_core::{ExportOutcome, OperationReport, Outcome, OutcomeStatus, RestoreOutcome};
use serde::Serialize;
use std::fmt;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl ExitCode {
    /// At least one target, or the trigger guard, failed
    pub(crate) const TARGET_FAILED: i32 = 1;
    /// The operation could not start or was aborted
    pub(crate) const SETUP_FAILED: i32 = 2;
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; never shown to the user.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Split a comma-separated argument into trimmed, non-empty names.
pub(crate) fn split_list(arg: Option<&str>) -> Vec<String> {
    arg.map(|list| {
        list.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn status_symbol(status: &OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Completed => "✓",
        OutcomeStatus::SkippedNoData => "-",
        OutcomeStatus::Failed(_) => "✗",
    }
}

/// Extra detail printed after a target's status.
pub(crate) trait OutcomeDetail {
    fn detail(&self) -> Option<String>;
}

impl OutcomeDetail for ExportOutcome {
    fn detail(&self) -> Option<String> {
        self.artifact.as_ref().map(|p| p.display().to_string())
    }
}

impl OutcomeDetail for RestoreOutcome {
    fn detail(&self) -> Option<String> {
        self.rows
            .map(|rows| format!("{} rows applied, {} failed", rows.applied, rows.failed))
    }
}

impl OutcomeDetail for pf_core::MaintenanceOutcome {
    fn detail(&self) -> Option<String> {
        None
    }
}

/// One report line, e.g. `  ✓ plant.sales.orders  completed  (/backups/x.csv)`.
pub(crate) fn format_outcome<T: Outcome + OutcomeDetail>(outcome: &T) -> String {
    let mut line = format!(
        "  {} {}  {}",
        status_symbol(outcome.status()),
        outcome.subject(),
        outcome.status()
    );
    if let Some(detail) = outcome.detail() {
        line.push_str(&format!("  ({})", detail));
    }
    line
}

/// Print a report and turn failures into an exit code.
pub(crate) fn finish_report<T>(report: &OperationReport<T>, json: bool) -> Result<()>
where
    T: Outcome + OutcomeDetail + Serialize,
{
    let summary = report.summary();

    if json {
        let out = serde_json::to_string_pretty(&ReportJson {
            report,
            summary: &summary,
        })
        .context("Failed to serialize report")?;
        println!("{}", out);
    } else {
        if report.is_empty() {
            println!("Nothing to do for {}.", report.operation);
        }
        for outcome in &report.outcomes {
            println!("{}", format_outcome(outcome));
        }
        if !report.guard.is_empty() {
            println!();
            println!("Trigger guard:");
            for guard in &report.guard {
                println!("  {}  {}", guard.trigger, guard.status);
            }
        }
        println!();
        println!("{}", summary);
    }

    if summary.has_failures() || report.guard_failed() {
        return Err(ExitCode(ExitCode::TARGET_FAILED).into());
    }
    Ok(())
}

#[derive(Serialize)]
struct ReportJson<'a, T: Outcome + Serialize> {
    #[serde(flatten)]
    report: &'a OperationReport<T>,
    summary: &'a pf_core::OutcomeSummary,
}

/// Print a list of names, one column, or as a JSON array.
pub(crate) fn print_names(header: &str, names: &[String], json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(names).context("Failed to serialize names")?
        );
        return Ok(());
    }
    let rows: Vec<Vec<String>> = names.iter().map(|n| vec![n.clone()]).collect();
    print_table(&[header], &rows);
    println!();
    println!("{} found", names.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Table-printing utilities
// ---------------------------------------------------------------------------

/// Calculate column widths for a table given headers and row data.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }
    widths
}

/// Print a left-aligned table: header row, dashes, then rows, two spaces apart.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  ").trim_end());

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  ").trim_end());
    }
}
