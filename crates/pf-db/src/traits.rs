//! Catalog trait definition

use crate::error::DbResult;
use crate::value::{QueryResult, SqlValue};
use async_trait::async_trait;

/// Name and declared type of a table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Direct database access used by the orchestration core.
///
/// Every method takes the database name explicitly; an implementation may
/// keep one connection per database. Statements use `$1, $2, ...`
/// placeholders and never interpolate values.
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Databases visible to the configured user, sorted by name
    async fn list_databases(&self) -> DbResult<Vec<String>>;

    /// User schemas in `database`, sorted by name
    async fn list_schemas(&self, database: &str) -> DbResult<Vec<String>>;

    /// Base tables in `database.schema`, sorted by name
    async fn list_tables(&self, database: &str, schema: &str) -> DbResult<Vec<String>>;

    /// Run a query and return every row
    async fn query(
        &self,
        database: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<QueryResult>;

    /// Number of rows `sql` returns
    async fn query_count(&self, database: &str, sql: &str, params: &[SqlValue]) -> DbResult<i64>;

    /// Execute one statement, returning affected rows
    async fn execute(&self, database: &str, sql: &str, params: &[SqlValue]) -> DbResult<u64>;

    /// Check whether a schema exists
    async fn schema_exists(&self, database: &str, schema: &str) -> DbResult<bool>;

    /// Check whether a trigger named `name` exists on any table in `schema`
    async fn trigger_exists(&self, database: &str, schema: &str, name: &str) -> DbResult<bool>;

    /// Columns of `schema.table` in ordinal order
    async fn column_types(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> DbResult<Vec<ColumnInfo>>;

    /// Backend identifier for logging
    fn backend_name(&self) -> &'static str;
}
