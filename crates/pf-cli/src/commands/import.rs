//! Import command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, ImportArgs};
use crate::commands::common::finish_report;
use crate::context::RuntimeContext;

/// Execute the import command
pub async fn execute(args: &ImportArgs, global: &GlobalArgs) -> Result<()> {
    let mut ctx = RuntimeContext::new(global)?;

    if !args.output.json {
        println!(
            "Importing {} file(s) into {}",
            args.files.len(),
            args.database
        );
    }

    let report = ctx
        .orchestrator
        .import_csv(&args.database, &args.files, args.key_column.as_deref())
        .await
        .context("Import aborted")?;

    finish_report(&report, args.output.json)
}
