//! Test doubles for the catalog and process seams

use crate::process::{CommandRunner, ProcessError, ProcessInvocation, ProcessOutput};
use async_trait::async_trait;
use pf_db::{Catalog, ColumnInfo, DbError, DbResult, DuckDbCatalog, QueryResult, SqlValue};
use std::collections::VecDeque;
use std::sync::Mutex;

/// DuckDB-backed catalog that also fakes triggers, which DuckDB lacks.
///
/// `CREATE TRIGGER <name> ...` statements are recorded instead of executed;
/// trigger lookups consult that record.
pub(crate) struct StubCatalog {
    inner: DuckDbCatalog,
    triggers: Mutex<Vec<String>>,
    trigger_checks: Mutex<Vec<String>>,
    fail_trigger_lookup: bool,
}

impl StubCatalog {
    pub fn empty() -> Self {
        Self {
            inner: DuckDbCatalog::in_memory().unwrap(),
            triggers: Mutex::new(Vec::new()),
            trigger_checks: Mutex::new(Vec::new()),
            fail_trigger_lookup: false,
        }
    }

    pub fn with_sql(sql: &str) -> Self {
        let catalog = Self::empty();
        catalog.inner.execute_batch(sql).unwrap();
        catalog
    }

    pub fn with_trigger(self, name: &str) -> Self {
        self.triggers.lock().unwrap().push(name.to_string());
        self
    }

    pub fn failing_trigger_lookup(mut self) -> Self {
        self.fail_trigger_lookup = true;
        self
    }

    pub fn trigger_checks(&self) -> Vec<String> {
        self.trigger_checks.lock().unwrap().clone()
    }

    pub fn created_triggers(&self) -> Vec<String> {
        self.triggers.lock().unwrap().clone()
    }
}

/// `sales.orders` has three rows in January 2024 and one in March;
/// `sales.returns` has a single row on 2024-02-29.
pub(crate) fn sales_fixture() -> StubCatalog {
    StubCatalog::with_sql(
        "CREATE SCHEMA sales;
         CREATE TABLE sales.orders (id BIGINT PRIMARY KEY, logged_at TIMESTAMP, note VARCHAR);
         CREATE TABLE sales.returns (id BIGINT PRIMARY KEY, logged_at TIMESTAMP);
         INSERT INTO sales.orders VALUES
            (1, TIMESTAMP '2024-01-01 00:00:00', 'first'),
            (2, TIMESTAMP '2024-01-15 12:30:00', 'mid'),
            (3, TIMESTAMP '2024-01-31 23:59:59', 'last'),
            (4, TIMESTAMP '2024-03-02 08:00:00', 'later');
         INSERT INTO sales.returns VALUES (1, TIMESTAMP '2024-02-29 23:59:59');",
    )
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn list_databases(&self) -> DbResult<Vec<String>> {
        self.inner.list_databases().await
    }

    async fn list_schemas(&self, database: &str) -> DbResult<Vec<String>> {
        self.inner.list_schemas(database).await
    }

    async fn list_tables(&self, database: &str, schema: &str) -> DbResult<Vec<String>> {
        self.inner.list_tables(database, schema).await
    }

    async fn query(
        &self,
        database: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<QueryResult> {
        self.inner.query(database, sql, params).await
    }

    async fn query_count(&self, database: &str, sql: &str, params: &[SqlValue]) -> DbResult<i64> {
        self.inner.query_count(database, sql, params).await
    }

    async fn execute(&self, database: &str, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let mut words = sql.split_whitespace();
        let is_trigger = matches!(
            (words.next(), words.next()),
            (Some(a), Some(b)) if a.eq_ignore_ascii_case("CREATE") && b.eq_ignore_ascii_case("TRIGGER")
        );
        if is_trigger {
            let name = words.next().unwrap_or_default().to_string();
            self.triggers.lock().unwrap().push(name);
            return Ok(0);
        }
        self.inner.execute(database, sql, params).await
    }

    async fn schema_exists(&self, database: &str, schema: &str) -> DbResult<bool> {
        self.inner.schema_exists(database, schema).await
    }

    async fn trigger_exists(&self, _database: &str, schema: &str, name: &str) -> DbResult<bool> {
        self.trigger_checks
            .lock()
            .unwrap()
            .push(format!("{}.{}", schema, name));
        if self.fail_trigger_lookup {
            return Err(DbError::ConnectionError("connection reset".to_string()));
        }
        Ok(self.triggers.lock().unwrap().iter().any(|t| t == name))
    }

    async fn column_types(
        &self,
        database: &str,
        schema: &str,
        table: &str,
    ) -> DbResult<Vec<ColumnInfo>> {
        self.inner.column_types(database, schema, table).await
    }

    fn backend_name(&self) -> &'static str {
        "stub"
    }
}

/// Records every invocation and answers from a script of canned outputs.
/// Unscripted calls succeed with empty output.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    calls: Mutex<Vec<ProcessInvocation>>,
    responses: Mutex<VecDeque<Result<ProcessOutput, String>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, output: ProcessOutput) -> Self {
        self.responses.lock().unwrap().push_back(Ok(output));
        self
    }

    pub fn fail_launch(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<ProcessInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &ProcessInvocation) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(invocation.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(ProcessError::Launch {
                program: invocation.program().display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            }),
            None => Ok(success()),
        }
    }
}

pub(crate) fn success() -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(0),
        ..Default::default()
    }
}

pub(crate) fn failure(stderr: &str, exit_code: i32) -> ProcessOutput {
    ProcessOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(exit_code),
    }
}
