//! Export command implementation

use anyhow::{Context, Result};
use pf_core::TimeWindow;

use crate::cli::{ExportArgs, GlobalArgs};
use crate::commands::common::{finish_report, split_list};
use crate::context::RuntimeContext;

/// Execute the export command
pub async fn execute(args: &ExportArgs, global: &GlobalArgs) -> Result<()> {
    let window = TimeWindow::parse(&args.from, &args.to).context("Invalid time window")?;
    let mut ctx = RuntimeContext::new(global)?;
    let tables = args.tables.as_deref().map(|t| split_list(Some(t)));
    let output_dir = ctx.resolve_dir(args.output_dir.as_deref());

    if !args.output.json {
        println!(
            "Exporting {}.{} rows from {} to {}",
            args.database,
            args.schema,
            window.start(),
            window.end()
        );
    }

    let report = ctx
        .orchestrator
        .export_filtered(
            &args.database,
            &args.schema,
            window,
            tables.as_deref(),
            output_dir.as_deref(),
        )
        .await
        .context("Export aborted")?;

    finish_report(&report, args.output.json)
}
