//! Dump command implementation

use anyhow::{Context, Result};

use crate::cli::{DumpArgs, GlobalArgs};
use crate::commands::common::{finish_report, split_list};
use crate::context::RuntimeContext;

/// Execute the dump command
pub async fn execute(args: &DumpArgs, global: &GlobalArgs) -> Result<()> {
    let mut ctx = RuntimeContext::new(global)?;
    let tables = split_list(args.tables.as_deref());
    let format = args
        .format
        .map(Into::into)
        .unwrap_or(ctx.orchestrator.settings().export.dump_format);
    let output_dir = ctx.resolve_dir(args.output_dir.as_deref());

    if !args.output.json {
        match tables.len() {
            0 => println!("Dumping {}.{} ({})", args.database, args.schema, format),
            n => println!(
                "Dumping {} table(s) from {}.{} ({})",
                n, args.database, args.schema, format
            ),
        }
    }

    let report = ctx
        .orchestrator
        .dump(
            &args.database,
            &args.schema,
            &tables,
            format,
            output_dir.as_deref(),
        )
        .await
        .context("Dump aborted")?;

    finish_report(&report, args.output.json)
}
