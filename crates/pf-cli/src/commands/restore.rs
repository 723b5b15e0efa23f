//! Restore command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, RestoreArgs};
use crate::commands::common::finish_report;
use crate::context::RuntimeContext;

/// Execute the restore command
pub async fn execute(args: &RestoreArgs, global: &GlobalArgs) -> Result<()> {
    let mut ctx = RuntimeContext::new(global)?;

    if !args.output.json {
        println!("Restoring {} into {}", args.file.display(), args.database);
    }

    let report = ctx
        .orchestrator
        .restore(&args.database, &args.file)
        .await
        .context("Restore aborted")?;

    finish_report(&report, args.output.json)
}
