//! pgferry CLI - snapshot, export and conflict-aware restore of PostgreSQL data

use clap::Parser;

mod cli;
mod commands;
mod context;
mod logging;

use cli::{Cli, Commands};
use commands::common::ExitCode;
use commands::{catalog, drop, dump, export, import, restore};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.global.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    let result = match &cli.command {
        Commands::Databases(args) => catalog::databases(args, &cli.global).await,
        Commands::Schemas(args) => catalog::schemas(args, &cli.global).await,
        Commands::Tables(args) => catalog::tables(args, &cli.global).await,
        Commands::Dump(args) => dump::execute(args, &cli.global).await,
        Commands::Export(args) => export::execute(args, &cli.global).await,
        Commands::Restore(args) => restore::execute(args, &cli.global).await,
        Commands::Import(args) => import::execute(args, &cli.global).await,
        Commands::DropSchema(args) => drop::schema(args, &cli.global).await,
        Commands::DropTables(args) => drop::tables(args, &cli.global).await,
    };

    if let Err(err) = result {
        let code = match err.downcast_ref::<ExitCode>() {
            Some(ExitCode(code)) => *code,
            None => {
                eprintln!("Error: {:#}", err);
                ExitCode::SETUP_FAILED
            }
        };
        std::process::exit(code);
    }
}
