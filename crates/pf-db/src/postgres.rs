//! PostgreSQL catalog implementation backed by sqlx
//!
//! One small pool is kept per database name and created on first use.
//! Server-level listings go through the `postgres` maintenance database.

use crate::error::{DbError, DbResult};
use crate::traits::{Catalog, ColumnInfo};
use crate::value::{QueryResult, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use pf_core::ConnectionSettings;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Database used for server-wide catalog queries
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// PostgreSQL catalog backend
pub struct PostgresCatalog {
    settings: ConnectionSettings,
    pools: Mutex<HashMap<String, PgPool>>,
}

impl PostgresCatalog {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            pools: Mutex::new(HashMap::new()),
        }
    }

    fn connect_options(&self, database: &str) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.settings.host)
            .port(self.settings.port)
            .username(&self.settings.user)
            .database(database)
            .application_name("pgferry");
        match &self.settings.password {
            Some(password) => options.password(password.expose()),
            None => options,
        }
    }

    async fn pool(&self, database: &str) -> DbResult<PgPool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(database) {
            return Ok(pool.clone());
        }

        log::debug!(
            "Connecting to {}@{}:{}/{}",
            self.settings.user,
            self.settings.host,
            self.settings.port,
            database
        );
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(self.settings.connect_timeout)
            .connect_with(self.connect_options(database))
            .await
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", database, e)))?;
        pools.insert(database.to_string(), pool.clone());
        Ok(pool)
    }

    async fn query_rows(
        &self,
        database: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<QueryResult> {
        let pool = self.pool(database).await?;
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&pool)
            .await
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_value(row, i)).collect())
            .collect::<DbResult<Vec<_>>>()?;

        Ok(QueryResult { columns, rows })
    }

    async fn query_strings(
        &self,
        database: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Vec<String>> {
        Ok(self
            .query_rows(database, sql, params)
            .await?
            .first_column_strings())
    }

    async fn count(&self, database: &str, sql: &str, params: &[SqlValue]) -> DbResult<i64> {
        let pool = self.pool(database).await?;
        let row = bind_all(sqlx::query(sql), params)
            .fetch_one(&pool)
            .await
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}

/// Bind parameters in order. NULL is sent untyped-as-text so an explicit
/// `CAST($n AS ...)` in the statement decides the column type.
fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(x) => query.bind(*x),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Timestamp(t) => query.bind(*t),
            SqlValue::TimestampTz(t) => query.bind(*t),
        };
    }
    query
}

/// Decode one cell by its server type. Types without a native mapping
/// (numeric, json, arrays, ...) are rendered as a `<type>` placeholder.
fn decode_value(row: &PgRow, index: usize) -> DbResult<SqlValue> {
    let type_name = row.column(index).type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| SqlValue::Int(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| SqlValue::Int(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| SqlValue::Float(v.into())),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(SqlValue::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|v| SqlValue::TimestampTz(v.fixed_offset())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|v| SqlValue::Text(v.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<Option<String>, _>(index)?.map(SqlValue::Text)
        }
        other => Some(SqlValue::Text(format!("<{}>", other.to_lowercase()))),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn list_databases(&self) -> DbResult<Vec<String>> {
        self.query_strings(
            MAINTENANCE_DATABASE,
            "SELECT datname::text FROM pg_database \
             WHERE NOT datistemplate AND datallowconn ORDER BY datname",
            &[],
        )
        .await
    }

    async fn list_schemas(&self, database: &str) -> DbResult<Vec<String>> {
        self.query_strings(
            database,
            "SELECT nspname::text FROM pg_namespace \
             WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema' \
             ORDER BY nspname",
            &[],
        )
        .await
    }

    async fn list_tables(&self, database: &str, schema: &str) -> DbResult<Vec<String>> {
        self.query_strings(
            database,
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name",
            &[SqlValue::from(schema)],
        )
        .await
    }

    async fn query(
        &self,
        database: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<QueryResult> {
        self.query_rows(database, sql, params).await
    }

    async fn query_count(&self, database: &str, sql: &str, params: &[SqlValue]) -> DbResult<i64> {
        self.count(
            database,
            &format!("SELECT COUNT(*) FROM ({}) AS q", sql),
            params,
        )
        .await
    }

    async fn execute(&self, database: &str, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let pool = self.pool(database).await?;
        let result = bind_all(sqlx::query(sql), params).execute(&pool).await?;
        Ok(result.rows_affected())
    }

    async fn schema_exists(&self, database: &str, schema: &str) -> DbResult<bool> {
        let count = self
            .count(
                database,
                "SELECT COUNT(*) FROM pg_namespace WHERE nspname = $1",
                &[SqlValue::from(schema)],
            )
            .await?;
        Ok(count > 0)
    }

    async fn trigger_exists(&self, database: &str, schema: &str, name: &str) -> DbResult<bool> {
        let count = self
            .count(
                database,
                "SELECT COUNT(*) FROM pg_trigger t \
                 JOIN pg_class c ON c.oid = t.tgrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE n.nspname = $1 AND t.tgname = $2 AND NOT t.tgisinternal",
                &[SqlValue::from(schema), SqlValue::from(name)],
            )
            .await?;
        Ok(count > 0)
    }

    async fn column_types(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> DbResult<Vec<ColumnInfo>> {
        let pool = self.pool(database).await?;
        let rows = sqlx::query(
            "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod) \
             FROM pg_attribute a \
             JOIN pg_class c ON c.oid = a.attrelid \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                })
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
