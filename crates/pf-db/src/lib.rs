//! pf-db - Catalog access for pgferry
//!
//! This crate provides the `Catalog` trait, the only way the rest of pgferry
//! talks to a database directly, with a PostgreSQL implementation (sqlx) and a
//! DuckDB implementation used for offline work and tests.

pub mod duckdb;
pub mod error;
pub mod postgres;
pub mod traits;
pub mod value;

pub use duckdb::DuckDbCatalog;
pub use error::{DbError, DbResult};
pub use postgres::PostgresCatalog;
pub use traits::{Catalog, ColumnInfo};
pub use value::{QueryResult, SqlValue};

use pf_core::{ConnectionSettings, DbType};
use std::sync::Arc;

/// Open a catalog for the configured backend.
pub fn connect(settings: ConnectionSettings) -> DbResult<Arc<dyn Catalog>> {
    match settings.db_type {
        DbType::Postgres => Ok(Arc::new(PostgresCatalog::new(settings))),
        DbType::DuckDb => Ok(Arc::new(DuckDbCatalog::new(&settings.path)?)),
    }
}
