//! Drop commands: whole schema or selected tables, both with CASCADE

use anyhow::{bail, Context, Result};

use crate::cli::{DropSchemaArgs, DropTablesArgs, GlobalArgs};
use crate::commands::common::{finish_report, split_list};
use crate::context::RuntimeContext;

/// Execute the drop-schema command
pub async fn schema(args: &DropSchemaArgs, global: &GlobalArgs) -> Result<()> {
    let mut ctx = RuntimeContext::new(global)?;
    let report = ctx
        .orchestrator
        .drop_schema(&args.database, &args.schema)
        .await
        .context("Drop aborted")?;
    finish_report(&report, args.output.json)
}

/// Execute the drop-tables command
pub async fn tables(args: &DropTablesArgs, global: &GlobalArgs) -> Result<()> {
    let tables = split_list(Some(&args.tables));
    if tables.is_empty() {
        bail!("--tables names no table");
    }
    let mut ctx = RuntimeContext::new(global)?;
    let report = ctx
        .orchestrator
        .drop_tables(&args.database, &args.schema, &tables)
        .await
        .context("Drop aborted")?;
    finish_report(&report, args.output.json)
}
