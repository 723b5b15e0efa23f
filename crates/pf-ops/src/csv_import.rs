//! Conflict-aware replay of snapshot CSV files
//!
//! A snapshot named `<prefix>_<schema>_<table>[_<suffix>].csv` is replayed
//! into `schema.table` one row at a time with
//! `INSERT ... ON CONFLICT (key) DO UPDATE`, so importing the same or an
//! overlapping file twice leaves the table unchanged.
//!
//! Each cell goes through a [`ColumnCoercionRule`]. A cell that fails to
//! parse becomes NULL rather than failing the row; a row the database
//! rejects is logged and skipped.

use crate::error::{OpsError, OpsResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use pf_core::sql_utils::{quote_ident, quote_ident_list, quote_qualified};
use pf_core::{
    CoreError, CoreResult, ImportConfig, OperationLog, OutcomeStatus, RestoreOutcome, RowCounts,
};
use pf_db::{Catalog, ColumnInfo, SqlValue};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Timestamp layouts carrying a UTC offset, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S",
];

/// Split a snapshot file name into `(schema, table)`.
///
/// The stem must have at least three `_`-separated tokens; token 1 is the
/// schema and token 2 the table.
pub fn parse_snapshot_name(path: &Path) -> CoreResult<(String, String)> {
    let invalid = || CoreError::InvalidSnapshotName {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    };
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let tokens: Vec<&str> = stem.split('_').collect();
    match tokens.as_slice() {
        [_, schema, table, ..] if !schema.is_empty() && !table.is_empty() => {
            Ok((schema.to_string(), table.to_string()))
        }
        _ => Err(invalid()),
    }
}

/// A parsed snapshot: header plus raw rows.
///
/// Reading is quoting-aware; cells are trimmed, invalid UTF-8 is replaced
/// rather than rejected, and ragged rows are kept as-is (the plan pads or
/// truncates them).
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    schema: String,
    table: String,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SnapshotFile {
    /// Read a snapshot from disk. The name is checked before the file is opened.
    pub fn read(path: &Path) -> OpsResult<Self> {
        let (schema, table) = parse_snapshot_name(path)?;
        let file = std::fs::File::open(path).map_err(|e| read_error(path, e))?;
        Self::from_reader(path, schema, table, file)
    }

    /// Parse snapshot content that is already in memory.
    pub fn parse(path: &Path, content: &str) -> OpsResult<Self> {
        let (schema, table) = parse_snapshot_name(path)?;
        Self::from_reader(path, schema, table, content.as_bytes())
    }

    fn from_reader<R: Read>(
        path: &Path,
        schema: String,
        table: String,
        source: R,
    ) -> OpsResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let header: Vec<String> = reader
            .byte_headers()
            .map_err(|e| read_error(path, e))?
            .iter()
            .map(|h| decode_cell(h).trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        if header.iter().all(|h| h.is_empty()) {
            return Err(read_error(path, "missing header row"));
        }

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record.map_err(|e| read_error(path, e))?;
            rows.push(record.iter().map(decode_cell).collect());
        }

        Ok(Self {
            path: path.to_path_buf(),
            schema,
            table,
            header,
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Invalid UTF-8 becomes U+FFFD so one bad cell never costs the other rows.
fn decode_cell(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn read_error(path: &Path, err: impl std::fmt::Display) -> OpsError {
    OpsError::SnapshotRead {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Per-column transform from raw text. Blank cells are NULL under every rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnCoercionRule {
    /// Signed 64-bit integer, NULL when unparseable
    Integer,
    /// Date-time, NULL when unparseable
    Timestamp,
    /// Passed through unchanged
    Text,
}

impl ColumnCoercionRule {
    pub fn apply(&self, raw: &str) -> SqlValue {
        let raw = raw.trim();
        if raw.is_empty() {
            return SqlValue::Null;
        }
        match self {
            ColumnCoercionRule::Integer => raw.parse::<i64>().map_or(SqlValue::Null, SqlValue::Int),
            ColumnCoercionRule::Timestamp => parse_timestamp(raw).unwrap_or(SqlValue::Null),
            ColumnCoercionRule::Text => SqlValue::Text(raw.to_string()),
        }
    }
}

/// Parse the timestamp layouts snapshot files are known to contain.
pub fn parse_timestamp(raw: &str) -> Option<SqlValue> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(SqlValue::TimestampTz(ts));
    }
    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(SqlValue::TimestampTz(ts));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(SqlValue::Timestamp(ts));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| SqlValue::Timestamp(d.and_time(NaiveTime::MIN)))
}

/// How one snapshot maps onto its table. Column order is header order and
/// matches the statement's parameter order.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    schema: String,
    table: String,
    columns: Vec<String>,
    rules: Vec<ColumnCoercionRule>,
    casts: Vec<Option<String>>,
    key_index: usize,
}

impl ImportPlan {
    /// Build a plan, failing if the header lacks `key_column` or repeats a column.
    /// Column matching is case-insensitive.
    pub fn new(
        snapshot: &SnapshotFile,
        key_column: &str,
        timestamp_column: Option<&str>,
    ) -> OpsResult<Self> {
        let columns = snapshot.header().to_vec();

        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.to_lowercase())) {
            return Err(OpsError::DuplicateColumn {
                path: snapshot.path().display().to_string(),
                column: dup.clone(),
            });
        }

        let key_index = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(key_column))
            .ok_or_else(|| OpsError::MissingKeyColumn {
                path: snapshot.path().display().to_string(),
                key_column: key_column.to_string(),
                header: columns.join(","),
            })?;

        let rules = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if i == key_index {
                    ColumnCoercionRule::Integer
                } else if timestamp_column.is_some_and(|t| column.eq_ignore_ascii_case(t)) {
                    ColumnCoercionRule::Timestamp
                } else {
                    ColumnCoercionRule::Text
                }
            })
            .collect();

        Ok(Self {
            schema: snapshot.schema().to_string(),
            table: snapshot.table().to_string(),
            casts: vec![None; columns.len()],
            columns,
            rules,
            key_index,
        })
    }

    /// Adopt the table's column spelling and cast each parameter to the
    /// column's declared type. Columns the table does not know keep the
    /// header spelling and no cast.
    pub fn with_column_types(mut self, table_columns: &[ColumnInfo]) -> Self {
        for (i, column) in self.columns.iter_mut().enumerate() {
            let info = table_columns
                .iter()
                .find(|c| c.name == *column)
                .or_else(|| {
                    table_columns
                        .iter()
                        .find(|c| c.name.eq_ignore_ascii_case(column))
                });
            if let Some(info) = info {
                *column = info.name.clone();
                self.casts[i] = Some(info.data_type.clone());
            }
        }
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rules(&self) -> &[ColumnCoercionRule] {
        &self.rules
    }

    pub fn key_column(&self) -> &str {
        &self.columns[self.key_index]
    }

    pub fn non_key_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.key_index)
            .map(|(_, c)| c.as_str())
    }

    /// `schema.table`, for logs
    pub fn target(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    pub fn upsert_sql(&self) -> String {
        let placeholders: Vec<String> = self
            .casts
            .iter()
            .enumerate()
            .map(|(i, cast)| match cast {
                Some(data_type) => format!("CAST(${} AS {})", i + 1, data_type),
                None => format!("${}", i + 1),
            })
            .collect();

        let updates: Vec<String> = self
            .non_key_columns()
            .map(|c| {
                let column = quote_ident(c);
                format!("{} = EXCLUDED.{}", column, column)
            })
            .collect();
        let on_conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            quote_qualified(&self.schema, &self.table),
            quote_ident_list(&self.columns),
            placeholders.join(", "),
            quote_ident(self.key_column()),
            on_conflict
        )
    }

    /// Coerce one record. Missing trailing cells are NULL; extra cells are ignored.
    pub fn coerce_row(&self, record: &[String]) -> Vec<SqlValue> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let raw = record.get(i).map(String::as_str).unwrap_or_default();
                let value = rule.apply(raw);
                if value.is_null() && !raw.trim().is_empty() {
                    log::debug!(
                        "{}: '{}' is not a valid {:?} value for {}, using NULL",
                        self.target(),
                        raw,
                        rule,
                        self.columns[i]
                    );
                }
                value
            })
            .collect()
    }
}

/// Replays snapshot files into their tables.
pub struct ConflictAwareCsvImporter {
    catalog: Arc<dyn Catalog>,
    settings: ImportConfig,
    log: Arc<OperationLog>,
}

impl ConflictAwareCsvImporter {
    pub fn new(catalog: Arc<dyn Catalog>, settings: ImportConfig, log: Arc<OperationLog>) -> Self {
        Self {
            catalog,
            settings,
            log,
        }
    }

    /// Import one file. Never fails as a whole: every problem ends up in the
    /// returned outcome.
    pub async fn import_file(
        &self,
        database: &str,
        path: &Path,
        key_column: Option<&str>,
    ) -> RestoreOutcome {
        let outcome = RestoreOutcome::new(database, path);

        let snapshot = match SnapshotFile::read(path) {
            Ok(snapshot) => snapshot,
            Err(e) => return self.reject(outcome, e.to_string()),
        };
        let outcome = outcome.with_table(snapshot.schema(), snapshot.table());

        let plan = match self.plan(database, &snapshot, key_column).await {
            Ok(plan) => plan,
            Err(reason) => return self.reject(outcome, reason),
        };

        if snapshot.rows().is_empty() {
            self.log.info(format!(
                "{} has no data rows, nothing imported into {}",
                path.display(),
                plan.target()
            ));
            return outcome
                .with_rows(RowCounts::default())
                .with_status(OutcomeStatus::SkippedNoData);
        }

        self.log.info(format!(
            "Importing {} rows from {} into {}.{}",
            snapshot.rows().len(),
            path.display(),
            database,
            plan.target()
        ));

        let sql = plan.upsert_sql();
        log::debug!("Upsert statement: {}", sql);

        let mut counts = RowCounts::default();
        for (index, record) in snapshot.rows().iter().enumerate() {
            let values = plan.coerce_row(record);
            match self.catalog.execute(database, &sql, &values).await {
                Ok(_) => counts.applied += 1,
                Err(e) => {
                    counts.failed += 1;
                    self.log.warn(format!(
                        "Record {} of {} rejected by {}: {}",
                        index + 1,
                        path.display(),
                        plan.target(),
                        e
                    ));
                }
            }
        }

        self.log.info(format!(
            "Imported {} into {}.{}: {} applied, {} failed",
            path.display(),
            database,
            plan.target(),
            counts.applied,
            counts.failed
        ));

        let outcome = outcome.with_rows(counts);
        if counts.failed == 0 {
            outcome
        } else {
            outcome.failed(format!(
                "{} of {} rows failed",
                counts.failed,
                counts.total()
            ))
        }
    }

    async fn plan(
        &self,
        database: &str,
        snapshot: &SnapshotFile,
        key_column: Option<&str>,
    ) -> Result<ImportPlan, String> {
        let key_column = key_column.unwrap_or(&self.settings.key_column);
        let plan = ImportPlan::new(
            snapshot,
            key_column,
            self.settings.timestamp_column.as_deref(),
        )
        .map_err(|e| e.to_string())?;

        match self
            .catalog
            .column_types(database, snapshot.schema(), snapshot.table())
            .await
        {
            Ok(columns) if columns.is_empty() => Err(format!(
                "table {} not found in {}",
                plan.target(),
                database
            )),
            Ok(columns) => Ok(plan.with_column_types(&columns)),
            Err(e) => {
                self.log.warn(format!(
                    "Could not read column types of {}, binding values untyped: {}",
                    plan.target(),
                    e
                ));
                Ok(plan)
            }
        }
    }

    fn reject(&self, outcome: RestoreOutcome, reason: String) -> RestoreOutcome {
        self.log.warn(format!(
            "Import of {} rejected: {}",
            outcome.source.display(),
            reason
        ));
        outcome.failed(reason)
    }
}

#[cfg(test)]
#[path = "csv_import_test.rs"]
mod tests;
