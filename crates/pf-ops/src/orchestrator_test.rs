use super::*;
use crate::test_support::{failure, sales_fixture, RecordingRunner, StubCatalog};
use pf_core::{ConnectionConfig, GuardStatus, TriggerDefinition};

const DB: &str = "memory";

fn audit_trigger() -> TriggerDefinition {
    TriggerDefinition {
        schema: "sales".to_string(),
        name: "trg_orders_audit".to_string(),
        statement: "CREATE TRIGGER trg_orders_audit AFTER INSERT ON sales.orders \
                    FOR EACH ROW EXECUTE FUNCTION audit()"
            .to_string(),
    }
}

fn settings(output_dir: &Path, triggers: Vec<TriggerDefinition>) -> OpsSettings {
    OpsSettings {
        connection: ConnectionConfig::default().resolve(),
        tools: ToolsConfig::default(),
        export: ExportConfig {
            time_column: "logged_at".to_string(),
            ..Default::default()
        },
        import: ImportConfig::default(),
        restore: RestoreConfig::default(),
        guard: GuardConfig { triggers },
        output_dir: output_dir.to_path_buf(),
    }
}

fn orchestrator(
    catalog: Arc<StubCatalog>,
    runner: Arc<RecordingRunner>,
    settings: OpsSettings,
) -> Orchestrator {
    Orchestrator::new(catalog, runner, settings, Arc::new(OperationLog::in_memory()))
}

fn january() -> TimeWindow {
    TimeWindow::parse("2024-01-01", "2024-01-31").unwrap()
}

#[test]
fn test_filter_tables_is_case_insensitive_and_ordered() {
    let tables = vec![
        "Orders".to_string(),
        "returns".to_string(),
        "order_lines".to_string(),
    ];
    assert_eq!(
        filter_tables(tables.clone(), Some("ORDER")),
        vec!["Orders", "order_lines"]
    );
    assert_eq!(filter_tables(tables.clone(), Some("  ")), tables);
    assert_eq!(filter_tables(tables.clone(), None), tables);
}

#[tokio::test]
async fn test_scenario_a_skips_table_without_rows() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let mut orch = orchestrator(
        Arc::new(sales_fixture()),
        runner.clone(),
        settings(dir.path(), vec![]),
    );

    let report = orch
        .export_filtered(DB, "sales", january(), None, None)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    let orders = &report.outcomes[0];
    assert_eq!(orders.target.table.as_deref(), Some("orders"));
    assert_eq!(orders.status, OutcomeStatus::Completed);
    assert_eq!(
        orders.artifact,
        Some(dir.path().join("memory_sales_orders_backup.csv"))
    );

    let returns = &report.outcomes[1];
    assert_eq!(returns.target.table.as_deref(), Some("returns"));
    assert_eq!(returns.status, OutcomeStatus::SkippedNoData);
    assert_eq!(returns.artifact, None);

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let script = calls[0].script().unwrap();
    assert!(script.contains("\"sales\".\"orders\""));
    assert!(!script.contains("returns"));

    assert_eq!(report.summary().to_string(), "1 completed, 1 skipped, 0 failed");
    assert_eq!(orch.phase(), OperationPhase::Idle);
}

#[tokio::test]
async fn test_empty_table_list_reports_nothing_to_export() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let mut orch = orchestrator(
        Arc::new(sales_fixture()),
        runner.clone(),
        settings(dir.path(), vec![]),
    );

    let report = orch
        .export_filtered(DB, "sales", january(), Some(&[]), None)
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(runner.calls().is_empty());
    assert!(orch
        .log()
        .lines()
        .iter()
        .any(|l| l.contains("Nothing to export from memory.sales")));
}

#[tokio::test]
async fn test_failed_export_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new().respond(failure("permission denied", 1)));
    let mut orch = orchestrator(
        Arc::new(sales_fixture()),
        runner.clone(),
        settings(dir.path(), vec![]),
    );
    let feb_to_mar = TimeWindow::parse("2024-02-01", "2024-03-31").unwrap();

    let report = orch
        .export_filtered(DB, "sales", feb_to_mar, None, None)
        .await
        .unwrap();

    assert_eq!(
        report.outcomes[0].status,
        OutcomeStatus::Failed("permission denied".to_string())
    );
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Completed);
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_dump_one_artifact_per_table() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let mut orch = orchestrator(
        Arc::new(sales_fixture()),
        runner.clone(),
        settings(dir.path(), vec![]),
    );
    let out = dir.path().join("custom");

    let report = orch
        .dump(
            DB,
            "sales",
            &["orders".to_string(), "returns".to_string()],
            DumpFormat::Custom,
            Some(&out),
        )
        .await
        .unwrap();

    let artifacts: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| o.artifact.clone().unwrap())
        .collect();
    assert_eq!(
        artifacts,
        vec![
            out.join("memory_sales_orders_backup.dump"),
            out.join("memory_sales_returns_backup.dump"),
        ]
    );
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_unknown_database_aborts_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let mut orch = orchestrator(
        Arc::new(sales_fixture()),
        runner.clone(),
        settings(dir.path(), vec![]),
    );

    let err = orch
        .dump(DB_TYPO, "sales", &[], DumpFormat::Plain, None)
        .await
        .unwrap_err();
    match err {
        OpsError::UnknownDatabase { database, available } => {
            assert_eq!(database, DB_TYPO);
            assert_eq!(available, "memory");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(runner.calls().is_empty());
    assert_eq!(orch.phase(), OperationPhase::Idle);
}

const DB_TYPO: &str = "memroy";

#[tokio::test]
async fn test_launch_failure_is_recorded_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new().fail_launch("no such file"));
    let mut orch = orchestrator(
        Arc::new(sales_fixture()),
        runner.clone(),
        settings(dir.path(), vec![]),
    );

    let report = orch
        .dump(
            DB,
            "sales",
            &["orders".to_string(), "returns".to_string()],
            DumpFormat::Plain,
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[0].status.is_failed());
    assert_eq!(report.outcomes[0].artifact, None);
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Completed);
    assert_eq!(runner.calls().len(), 2);
    assert!(orch
        .log()
        .lines()
        .iter()
        .any(|l| l.contains("dump finished: 1 completed, 0 skipped, 1 failed")));
    assert_eq!(orch.phase(), OperationPhase::Idle);
}

#[tokio::test]
async fn test_restore_launch_failure_still_runs_guard() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("memory_sales_backup.sql");
    std::fs::write(&file, "CREATE TABLE t (id int);").unwrap();

    let catalog = Arc::new(StubCatalog::empty());
    let runner = Arc::new(RecordingRunner::new().fail_launch("psql: not found"));
    let mut orch = orchestrator(
        catalog.clone(),
        runner.clone(),
        settings(dir.path(), vec![audit_trigger()]),
    );

    let report = orch.restore(DB, &file).await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    match &report.outcomes[0].status {
        OutcomeStatus::Failed(reason) => assert!(reason.contains("psql: not found"), "{}", reason),
        other => panic!("unexpected status: {:?}", other),
    }
    assert_eq!(catalog.trigger_checks(), vec!["sales.trg_orders_audit"]);
    assert_eq!(report.guard.len(), 1);
    assert_eq!(report.guard[0].status, GuardStatus::Created);
    assert_eq!(orch.phase(), OperationPhase::Idle);
}

#[tokio::test]
async fn test_scenario_c_failed_restore_still_runs_guard() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("memory_sales_backup.sql");
    std::fs::write(&file, "CREATE TABLE t (id int);").unwrap();

    let catalog = Arc::new(StubCatalog::empty());
    let runner = Arc::new(RecordingRunner::new().respond(failure("boom", 1)));
    let mut orch = orchestrator(
        catalog.clone(),
        runner.clone(),
        settings(dir.path(), vec![audit_trigger()]),
    );

    let report = orch.restore(DB, &file).await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(
        report.outcomes[0].status,
        OutcomeStatus::Failed("boom".to_string())
    );
    assert_eq!(catalog.trigger_checks(), vec!["sales.trg_orders_audit"]);
    assert_eq!(report.guard.len(), 1);
    assert_eq!(report.guard[0].status, GuardStatus::Created);
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_guard_failure_leaves_restore_outcome_alone() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("memory_sales_backup.dump");
    std::fs::write(&file, b"PGDMP").unwrap();

    let catalog = Arc::new(StubCatalog::empty().failing_trigger_lookup());
    let mut orch = orchestrator(
        catalog,
        Arc::new(RecordingRunner::new()),
        settings(dir.path(), vec![audit_trigger()]),
    );

    let report = orch.restore(DB, &file).await.unwrap();

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Completed);
    assert!(report.guard_failed());
    assert!(!report.summary().has_failures());
}

#[tokio::test]
async fn test_restore_without_triggers_has_no_guard_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("memory_sales_backup.sql");
    std::fs::write(&file, "SELECT 1;").unwrap();

    let catalog = Arc::new(StubCatalog::empty());
    let mut orch = orchestrator(
        catalog.clone(),
        Arc::new(RecordingRunner::new()),
        settings(dir.path(), vec![]),
    );

    let report = orch.restore(DB, &file).await.unwrap();
    assert!(report.guard.is_empty());
    assert!(catalog.trigger_checks().is_empty());
}

#[tokio::test]
async fn test_import_each_file_is_its_own_target() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("memory_sales_orders_backup.csv");
    std::fs::write(
        &good,
        "id,logged_at,note\n5,2024-02-01 10:00:00,new\n1,2024-01-01 00:00:00,changed\n",
    )
    .unwrap();
    let bad = dir.path().join("orders.csv");
    std::fs::write(&bad, "id,note\n9,x\n").unwrap();

    let catalog = Arc::new(sales_fixture());
    let runner = Arc::new(RecordingRunner::new());
    let mut orch = orchestrator(
        catalog.clone(),
        runner.clone(),
        settings(dir.path(), vec![audit_trigger()]),
    );

    let report = orch
        .import_csv(DB, &[good, bad], Some("id"))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Completed);
    assert!(report.outcomes[1].status.is_failed());
    assert_eq!(report.guard[0].status, GuardStatus::Created);
    assert!(runner.calls().is_empty());

    let count = catalog
        .query_count(DB, "SELECT * FROM sales.orders", &[])
        .await
        .unwrap();
    assert_eq!(count, 5);
    let note = catalog
        .query(DB, "SELECT note FROM sales.orders WHERE id = 1", &[])
        .await
        .unwrap();
    assert_eq!(note.rows[0][0], SqlValue::Text("changed".to_string()));
    assert_eq!(orch.phase(), OperationPhase::Idle);
}

#[tokio::test]
async fn test_drop_schema_checks_existence_first() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(sales_fixture());
    let mut orch = orchestrator(
        catalog.clone(),
        Arc::new(RecordingRunner::new()),
        settings(dir.path(), vec![]),
    );

    let missing = orch.drop_schema(DB, "ghost").await.unwrap();
    assert_eq!(missing.outcomes[0].status, OutcomeStatus::SkippedNoData);
    assert!(orch
        .log()
        .lines()
        .iter()
        .any(|l| l.contains("Schema memory.ghost not found")));

    let dropped = orch.drop_schema(DB, "sales").await.unwrap();
    assert_eq!(dropped.outcomes[0].status, OutcomeStatus::Completed);
    assert!(!catalog.schema_exists(DB, "sales").await.unwrap());
}

#[tokio::test]
async fn test_drop_tables_continues_past_failures() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(sales_fixture());
    let mut orch = orchestrator(
        catalog.clone(),
        Arc::new(RecordingRunner::new()),
        settings(dir.path(), vec![]),
    );

    let report = orch
        .drop_tables(
            DB,
            "sales",
            &["missing".to_string(), "orders".to_string()],
        )
        .await
        .unwrap();

    assert!(report.outcomes[0].status.is_failed());
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Completed);
    assert_eq!(
        orch.list_tables(DB, "sales", None).await.unwrap(),
        vec!["returns"]
    );
}

#[tokio::test]
async fn test_list_tables_with_search() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        Arc::new(sales_fixture()),
        Arc::new(RecordingRunner::new()),
        settings(dir.path(), vec![]),
    );
    assert_eq!(
        orch.list_tables(DB, "sales", Some("RET")).await.unwrap(),
        vec!["returns"]
    );
    assert!(orch.list_schemas(DB).await.unwrap().contains(&"sales".to_string()));
}

#[test]
fn test_settings_apply_target_override() {
    let yaml = r#"
name: plant
export:
  output_dir: backups
targets:
  staging:
    output_dir: /srv/staging-backups
    connection:
      host: staging.db
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let root = Path::new("/work");

    let default = OpsSettings::from_config(&config, root, None).unwrap();
    assert_eq!(default.output_dir, PathBuf::from("/work/backups"));
    assert_eq!(default.connection.host, "localhost");

    let staging = OpsSettings::from_config(&config, root, Some("staging")).unwrap();
    assert_eq!(staging.output_dir, PathBuf::from("/srv/staging-backups"));
    assert_eq!(staging.connection.host, "staging.db");
}
