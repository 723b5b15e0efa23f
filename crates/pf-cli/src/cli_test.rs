use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Short flag conflicts and duplicate args across the whole tree.
    Cli::command().debug_assert();
}

#[test]
fn test_export_args() {
    let cli = Cli::parse_from([
        "pgferry",
        "--target",
        "staging",
        "export",
        "-d",
        "plant",
        "-s",
        "sales",
        "--from",
        "2024-01-01",
        "--to",
        "2024-01-31",
        "--tables",
        "orders,returns",
    ]);
    assert_eq!(cli.global.target.as_deref(), Some("staging"));
    match cli.command {
        Commands::Export(args) => {
            assert_eq!(args.database, "plant");
            assert_eq!(args.schema, "sales");
            assert_eq!(args.from, "2024-01-01");
            assert_eq!(args.tables.as_deref(), Some("orders,returns"));
            assert!(!args.output.json);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_import_takes_several_files() {
    let cli = Cli::parse_from([
        "pgferry",
        "import",
        "--database",
        "plant",
        "a_sales_orders.csv",
        "b_sales_returns.csv",
        "--key-column",
        "id",
        "--json",
    ]);
    match cli.command {
        Commands::Import(args) => {
            assert_eq!(args.files.len(), 2);
            assert_eq!(args.key_column.as_deref(), Some("id"));
            assert!(args.output.json);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_import_requires_a_file() {
    assert!(Cli::try_parse_from(["pgferry", "import", "-d", "plant"]).is_err());
}

#[test]
fn test_dump_format_value() {
    let cli = Cli::parse_from([
        "pgferry", "dump", "-d", "plant", "-s", "sales", "--format", "custom",
    ]);
    match cli.command {
        Commands::Dump(args) => {
            assert_eq!(args.format.map(DumpFormat::from), Some(DumpFormat::Custom));
            assert!(args.tables.is_none());
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::parse_from(["pgferry", "databases", "-v", "-p", "/srv/project"]);
    assert!(cli.global.verbose);
    assert_eq!(cli.global.project_dir, "/srv/project");
}
