//! DuckDB catalog implementation
//!
//! A single connection serves every `database` argument; statements run
//! against the connection's attached catalogs. DuckDB has no triggers, so
//! trigger lookups report `NotImplemented`.

use crate::error::{DbError, DbResult};
use crate::traits::{Catalog, ColumnInfo};
use crate::value::{QueryResult, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, Value};
use duckdb::{params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// DuckDB catalog backend
pub struct DuckDbCatalog {
    conn: Mutex<Connection>,
}

impl DuckDbCatalog {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Execute a batch of statements without parameters (fixtures, setup)
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute a query and collect typed rows.
    ///
    /// DuckDB panics on `stmt.column_count()` before execution, so rows are
    /// collected via `query_map` first and column metadata read afterwards.
    fn query_sync(&self, sql: &str, params: Vec<Value>) -> DbResult<QueryResult> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows: Vec<Vec<SqlValue>> = stmt
            .query_map(params_from_iter(params), |row| {
                let col_count = row.as_ref().column_count();
                (0..col_count)
                    .map(|i| row.get::<_, Value>(i).map(from_duckdb_value))
                    .collect()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let columns = (0..stmt.column_count())
            .map(|i| stmt.column_name(i).map_or("?".to_string(), |v| v.to_string()))
            .collect();

        Ok(QueryResult { columns, rows })
    }

    fn query_strings_sync(&self, sql: &str, params: Vec<Value>) -> DbResult<Vec<String>> {
        Ok(self.query_sync(sql, params)?.first_column_strings())
    }

    fn count_sync(&self, sql: &str, params: Vec<Value>) -> DbResult<i64> {
        let conn = self.lock()?;
        conn.query_row(sql, params_from_iter(params), |row| row.get::<_, i64>(0))
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    fn execute_sync(&self, sql: &str, params: Vec<Value>) -> DbResult<u64> {
        let conn = self.lock()?;
        let affected = conn
            .execute(sql, params_from_iter(params))
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))?;
        Ok(affected as u64)
    }
}

/// Timestamps are bound as text; DuckDB casts them from the parameter's context.
fn to_duckdb_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Boolean(*b),
        SqlValue::Int(i) => Value::BigInt(*i),
        SqlValue::Float(x) => Value::Double(*x),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Timestamp(_) | SqlValue::TimestampTz(_) => Value::Text(value.to_string()),
    }
}

fn from_duckdb_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Bool(b),
        Value::TinyInt(i) => SqlValue::Int(i.into()),
        Value::SmallInt(i) => SqlValue::Int(i.into()),
        Value::Int(i) => SqlValue::Int(i.into()),
        Value::BigInt(i) => SqlValue::Int(i),
        Value::UTinyInt(i) => SqlValue::Int(i.into()),
        Value::USmallInt(i) => SqlValue::Int(i.into()),
        Value::UInt(i) => SqlValue::Int(i.into()),
        Value::Float(x) => SqlValue::Float(x.into()),
        Value::Double(x) => SqlValue::Float(x),
        Value::Text(s) => SqlValue::Text(s),
        Value::Timestamp(unit, raw) => timestamp_from_raw(unit, raw),
        Value::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .map(|d| SqlValue::Text(d.to_string()))
            .unwrap_or(SqlValue::Null),
        other => SqlValue::Text(format!("{:?}", other)),
    }
}

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn timestamp_from_raw(unit: TimeUnit, raw: i64) -> SqlValue {
    let micros = match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros)
        .map(|dt| SqlValue::Timestamp(dt.naive_utc()))
        .unwrap_or(SqlValue::Null)
}

fn to_duckdb_values(params: &[SqlValue]) -> Vec<Value> {
    params.iter().map(to_duckdb_value).collect()
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

#[async_trait]
impl Catalog for DuckDbCatalog {
    async fn list_databases(&self) -> DbResult<Vec<String>> {
        self.query_strings_sync(
            "SELECT database_name FROM duckdb_databases() WHERE NOT internal ORDER BY database_name",
            Vec::new(),
        )
    }

    async fn list_schemas(&self, database: &str) -> DbResult<Vec<String>> {
        self.query_strings_sync(
            "SELECT schema_name FROM information_schema.schemata \
             WHERE catalog_name = $1 AND schema_name NOT IN ('information_schema', 'pg_catalog') \
             ORDER BY schema_name",
            vec![text(database)],
        )
    }

    async fn list_tables(&self, database: &str, schema: &str) -> DbResult<Vec<String>> {
        self.query_strings_sync(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_catalog = $1 AND table_schema = $2 AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
            vec![text(database), text(schema)],
        )
    }

    async fn query(
        &self,
        _database: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<QueryResult> {
        self.query_sync(sql, to_duckdb_values(params))
    }

    async fn query_count(&self, _database: &str, sql: &str, params: &[SqlValue]) -> DbResult<i64> {
        self.count_sync(
            &format!("SELECT COUNT(*) FROM ({}) AS q", sql),
            to_duckdb_values(params),
        )
    }

    async fn execute(&self, _database: &str, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        self.execute_sync(sql, to_duckdb_values(params))
    }

    async fn schema_exists(&self, database: &str, schema: &str) -> DbResult<bool> {
        let count = self.count_sync(
            "SELECT COUNT(*) FROM information_schema.schemata \
             WHERE catalog_name = $1 AND schema_name = $2",
            vec![text(database), text(schema)],
        )?;
        Ok(count > 0)
    }

    async fn trigger_exists(&self, _database: &str, _schema: &str, _name: &str) -> DbResult<bool> {
        Err(DbError::NotImplemented {
            backend: "duckdb".to_string(),
            feature: "triggers".to_string(),
        })
    }

    async fn column_types(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> DbResult<Vec<ColumnInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_catalog = $1 AND table_schema = $2 AND table_name = $3 \
             ORDER BY ordinal_position",
        )?;
        let rows = stmt.query_map(
            params_from_iter([text(database), text(schema), text(table)]),
            |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                })
            },
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    fn backend_name(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
