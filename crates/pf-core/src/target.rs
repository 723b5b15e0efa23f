//! Export targets and time windows

use crate::error::{CoreError, CoreResult};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;

/// A closed interval of calendar days.
///
/// Both ends are inclusive at day granularity: a row stamped anywhere on
/// `end` falls inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeWindow {
    /// Create a window, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidTimeWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse a window from two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> CoreResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
                CoreError::ConfigInvalid {
                    message: format!("invalid date '{}': {} (expected YYYY-MM-DD)", s, e),
                }
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First instant inside the window (`start` at midnight).
    pub fn lower_bound(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// First instant after the window (midnight of the day after `end`).
    ///
    /// Saturates at `NaiveDate::MAX` so a window ending on the last
    /// representable day still has a bound.
    pub fn upper_bound_exclusive(&self) -> NaiveDateTime {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
            .and_time(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One object to export: a schema, or a single table, optionally time-filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTarget {
    pub database: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
}

impl ExportTarget {
    /// A whole-schema target.
    pub fn schema(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: None,
            window: None,
        }
    }

    /// A single-table target without a time filter.
    pub fn table(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: Some(table.into()),
            window: None,
        }
    }

    /// A single-table target restricted to `window`.
    pub fn filtered(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
        window: TimeWindow,
    ) -> Self {
        Self {
            window: Some(window),
            ..Self::table(database, schema, table)
        }
    }

    /// Attach a time window. Fails for schema-level targets, since time
    /// filtering only ever applies per table.
    pub fn with_window(self, window: TimeWindow) -> CoreResult<Self> {
        if self.table.is_none() {
            return Err(CoreError::WindowWithoutTable {
                database: self.database,
                schema: self.schema,
            });
        }
        Ok(Self {
            window: Some(window),
            ..self
        })
    }

    /// Human-readable `database.schema[.table]` label for logs.
    pub fn label(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}.{}", self.database, self.schema, table),
            None => format!("{}.{}", self.database, self.schema),
        }
    }

    /// Artifact file name: `<db>_<schema>[_<table>]_backup.<ext>`.
    ///
    /// Per-table names keep schema and table at token positions 1 and 2 so the
    /// CSV importer can read them back.
    pub fn artifact_file_name(&self, extension: &str) -> String {
        match &self.table {
            Some(table) => format!(
                "{}_{}_{}_backup.{}",
                self.database, self.schema, table, extension
            ),
            None => format!("{}_{}_backup.{}", self.database, self.schema, extension),
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.window {
            Some(window) => write!(f, "{} [{}]", self.label(), window),
            None => write!(f, "{}", self.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_rejects_reversed_range() {
        let err = TimeWindow::new(date(2024, 2, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimeWindow { .. }));
    }

    #[test]
    fn test_window_single_day_is_valid() {
        let w = TimeWindow::new(date(2024, 1, 5), date(2024, 1, 5)).unwrap();
        assert_eq!(w.lower_bound().to_string(), "2024-01-05 00:00:00");
        assert_eq!(w.upper_bound_exclusive().to_string(), "2024-01-06 00:00:00");
    }

    #[test]
    fn test_window_bounds_cover_whole_end_day() {
        let w = TimeWindow::parse("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(w.lower_bound().to_string(), "2024-01-01 00:00:00");
        assert_eq!(w.upper_bound_exclusive().to_string(), "2024-02-01 00:00:00");
        assert_eq!(w.to_string(), "2024-01-01..2024-01-31");
    }

    #[test]
    fn test_window_parse_rejects_garbage() {
        assert!(TimeWindow::parse("2024-13-01", "2024-01-31").is_err());
        assert!(TimeWindow::parse("yesterday", "2024-01-31").is_err());
    }

    #[test]
    fn test_window_requires_table() {
        let w = TimeWindow::parse("2024-01-01", "2024-01-31").unwrap();
        let err = ExportTarget::schema("db", "sales").with_window(w).unwrap_err();
        assert!(matches!(err, CoreError::WindowWithoutTable { .. }));

        let t = ExportTarget::table("db", "sales", "orders")
            .with_window(w)
            .unwrap();
        assert_eq!(t.window, Some(w));
    }

    #[test]
    fn test_artifact_file_names() {
        assert_eq!(
            ExportTarget::schema("plant", "sales").artifact_file_name("sql"),
            "plant_sales_backup.sql"
        );
        assert_eq!(
            ExportTarget::table("plant", "sales", "orders").artifact_file_name("csv"),
            "plant_sales_orders_backup.csv"
        );
    }

    #[test]
    fn test_display_includes_window() {
        let w = TimeWindow::parse("2024-01-01", "2024-01-31").unwrap();
        let t = ExportTarget::filtered("db", "sales", "orders", w);
        assert_eq!(t.to_string(), "db.sales.orders [2024-01-01..2024-01-31]");
    }
}
