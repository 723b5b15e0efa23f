//! Catalog browsing: databases, schemas, tables

use anyhow::{Context, Result};

use crate::cli::{DatabasesArgs, GlobalArgs, SchemasArgs, TablesArgs};
use crate::commands::common::print_names;
use crate::context::RuntimeContext;

/// Execute the databases command
pub async fn databases(args: &DatabasesArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let names = ctx
        .orchestrator
        .list_databases()
        .await
        .context("Failed to list databases")?;
    print_names("DATABASE", &names, args.output.json)
}

/// Execute the schemas command
pub async fn schemas(args: &SchemasArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let names = ctx
        .orchestrator
        .list_schemas(&args.database)
        .await
        .with_context(|| format!("Failed to list schemas of {}", args.database))?;
    print_names("SCHEMA", &names, args.output.json)
}

/// Execute the tables command
pub async fn tables(args: &TablesArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let names = ctx
        .orchestrator
        .list_tables(&args.database, &args.schema, args.search.as_deref())
        .await
        .with_context(|| format!("Failed to list tables of {}.{}", args.database, args.schema))?;
    print_names("TABLE", &names, args.output.json)
}
