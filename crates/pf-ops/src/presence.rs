//! Bounded data-presence probe

use pf_core::sql_utils::{quote_ident, quote_qualified};
use pf_core::{OperationLog, TimeWindow};
use pf_db::{Catalog, SqlValue};
use std::sync::Arc;

/// Answers "does this table have at least one row in the window?"
///
/// The probe stops at the first matching row. Any query error counts as
/// "no data" so the table is skipped; the error is logged in full.
pub struct DataPresenceChecker {
    catalog: Arc<dyn Catalog>,
    time_column: String,
    log: Arc<OperationLog>,
}

impl DataPresenceChecker {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        time_column: impl Into<String>,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            catalog,
            time_column: time_column.into(),
            log,
        }
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    /// Probe statement for one table; bounds are `$1` (inclusive) and `$2` (exclusive).
    pub fn probe_sql(&self, schema: &str, table: &str) -> String {
        let column = quote_ident(&self.time_column);
        format!(
            "SELECT 1 FROM {} WHERE {} >= CAST($1 AS TIMESTAMP) AND {} < CAST($2 AS TIMESTAMP) LIMIT 1",
            quote_qualified(schema, table),
            column,
            column
        )
    }

    pub async fn has_rows(
        &self,
        database: &str,
        schema: &str,
        table: &str,
        window: &TimeWindow,
    ) -> bool {
        let params = [
            SqlValue::Timestamp(window.lower_bound()),
            SqlValue::Timestamp(window.upper_bound_exclusive()),
        ];
        match self
            .catalog
            .query_count(database, &self.probe_sql(schema, table), &params)
            .await
        {
            Ok(count) => count > 0,
            Err(e) => {
                self.log.warn(format!(
                    "Data check failed for {}.{}.{} ({} in {}), treating as no data: {}",
                    database, schema, table, self.time_column, window, e
                ));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sales_fixture, StubCatalog};

    fn january() -> TimeWindow {
        TimeWindow::parse("2024-01-01", "2024-01-31").unwrap()
    }

    #[test]
    fn test_probe_sql_quotes_identifiers() {
        let checker = DataPresenceChecker::new(
            Arc::new(StubCatalog::empty()),
            "logged\"at",
            Arc::new(OperationLog::in_memory()),
        );
        assert_eq!(
            checker.probe_sql("sales", "orders"),
            "SELECT 1 FROM \"sales\".\"orders\" WHERE \"logged\"\"at\" >= CAST($1 AS TIMESTAMP) \
             AND \"logged\"\"at\" < CAST($2 AS TIMESTAMP) LIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_detects_rows_in_window() {
        let catalog = Arc::new(sales_fixture());
        let checker =
            DataPresenceChecker::new(catalog, "logged_at", Arc::new(OperationLog::in_memory()));
        assert!(checker.has_rows("memory", "sales", "orders", &january()).await);
        assert!(!checker.has_rows("memory", "sales", "returns", &january()).await);
    }

    #[tokio::test]
    async fn test_last_day_of_window_is_included() {
        let catalog = Arc::new(sales_fixture());
        let checker =
            DataPresenceChecker::new(catalog, "logged_at", Arc::new(OperationLog::in_memory()));
        // returns has one row at 2024-02-29 23:59:59
        let feb = TimeWindow::parse("2024-02-29", "2024-02-29").unwrap();
        assert!(checker.has_rows("memory", "sales", "returns", &feb).await);
    }

    #[tokio::test]
    async fn test_probe_error_is_no_data_and_logged() {
        let catalog = Arc::new(sales_fixture());
        let log = Arc::new(OperationLog::in_memory());
        let checker = DataPresenceChecker::new(catalog, "missing_column", log.clone());

        assert!(!checker.has_rows("memory", "sales", "orders", &january()).await);
        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Data check failed for memory.sales.orders"));
        assert!(lines[0].contains("missing_column"));
    }
}
