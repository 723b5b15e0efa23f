//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use pf_core::DumpFormat;
use std::path::PathBuf;

/// pgferry - snapshot, export and conflict-aware restore of PostgreSQL data
#[derive(Parser, Debug)]
#[command(name = "pgferry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override target (connection and output directory)
    #[arg(short, long, global = true)]
    pub target: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List databases on the server
    Databases(DatabasesArgs),

    /// List schemas of a database
    Schemas(SchemasArgs),

    /// List tables of a schema
    Tables(TablesArgs),

    /// Dump a schema, or selected tables, with pg_dump
    Dump(DumpArgs),

    /// Export rows inside a date window as one CSV per table
    Export(ExportArgs),

    /// Restore a dump archive or SQL script
    Restore(RestoreArgs),

    /// Replay snapshot CSV files with insert-or-update on the key column
    Import(ImportArgs),

    /// Drop a schema and everything in it
    DropSchema(DropSchemaArgs),

    /// Drop selected tables of a schema
    DropTables(DropTablesArgs),
}

/// Output options shared by every command
#[derive(Args, Debug, Clone, Copy)]
pub struct OutputArgs {
    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the databases command
#[derive(Args, Debug)]
pub struct DatabasesArgs {
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the schemas command
#[derive(Args, Debug)]
pub struct SchemasArgs {
    /// Database name
    #[arg(short, long)]
    pub database: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the tables command
#[derive(Args, Debug)]
pub struct TablesArgs {
    /// Database name
    #[arg(short, long)]
    pub database: String,

    /// Schema name
    #[arg(short, long)]
    pub schema: String,

    /// Only tables whose name contains this text (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Dump formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    /// Plain SQL script (.sql)
    Plain,
    /// pg_dump custom archive (.dump)
    Custom,
}

impl From<FormatArg> for DumpFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Plain => DumpFormat::Plain,
            FormatArg::Custom => DumpFormat::Custom,
        }
    }
}

/// Arguments for the dump command
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Database name
    #[arg(short, long)]
    pub database: String,

    /// Schema name
    #[arg(short, long)]
    pub schema: String,

    /// Tables to dump (comma-separated, default: the whole schema)
    #[arg(long)]
    pub tables: Option<String>,

    /// Override output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Dump format (default: from config)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Database name
    #[arg(short, long)]
    pub database: String,

    /// Schema name
    #[arg(short, long)]
    pub schema: String,

    /// First day of the window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub from: String,

    /// Last day of the window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub to: String,

    /// Tables to consider (comma-separated, default: every table of the schema)
    #[arg(long)]
    pub tables: Option<String>,

    /// Override output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the restore command
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Database to restore into
    #[arg(short, long)]
    pub database: String,

    /// Archive (.dump) or SQL script (.sql) to replay
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Database to import into
    #[arg(short, long)]
    pub database: String,

    /// Snapshot files named <prefix>_<schema>_<table>[_<suffix>].csv
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Key column (default: from config)
    #[arg(short, long)]
    pub key_column: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the drop-schema command
#[derive(Args, Debug)]
pub struct DropSchemaArgs {
    /// Database name
    #[arg(short, long)]
    pub database: String,

    /// Schema to drop
    #[arg(short, long)]
    pub schema: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the drop-tables command
#[derive(Args, Debug)]
pub struct DropTablesArgs {
    /// Database name
    #[arg(short, long)]
    pub database: String,

    /// Schema name
    #[arg(short, long)]
    pub schema: String,

    /// Tables to drop (comma-separated)
    #[arg(long, required = true)]
    pub tables: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
