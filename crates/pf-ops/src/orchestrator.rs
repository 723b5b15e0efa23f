//! One user-initiated operation at a time
//!
//! Every operation walks `Idle -> Planning -> {ProcessRunning | RowImporting}
//! -> Reporting -> Idle`. Targets are handled one after another in catalog
//! order; a failed target is recorded and the loop moves on, even when the
//! tool could not be launched. Only setup problems (unknown database,
//! unreachable catalog) end an operation early, and the phase still returns
//! to `Idle`.

use crate::csv_import::ConflictAwareCsvImporter;
use crate::dump::DumpInvoker;
use crate::error::{OpsError, OpsResult};
use crate::guard::SchemaMigrationGuard;
use crate::planner::{FilteredExportPlanner, PlannedExport};
use crate::presence::DataPresenceChecker;
use crate::process::CommandRunner;
use pf_core::sql_utils::{quote_ident, quote_qualified};
use pf_core::{
    Config, ConnectionSettings, CoreResult, DumpFormat, ExportConfig, ExportOutcome, ExportTarget,
    GuardConfig, GuardOutcome, ImportConfig, MaintenanceOutcome, OperationLog, OperationReport,
    Outcome, OutcomeStatus, RestoreConfig, RestoreOutcome, TimeWindow, ToolsConfig,
};
use pf_db::{Catalog, SqlValue};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything an operation needs from the configuration, with the target
/// override already applied.
#[derive(Debug, Clone)]
pub struct OpsSettings {
    pub connection: ConnectionSettings,
    pub tools: ToolsConfig,
    pub export: ExportConfig,
    pub import: ImportConfig,
    pub restore: RestoreConfig,
    pub guard: GuardConfig,
    /// Default artifact directory, absolute or relative to the working directory
    pub output_dir: PathBuf,
}

impl OpsSettings {
    /// Resolve settings for `target`; the output directory is joined to `root`.
    pub fn from_config(config: &Config, root: &Path, target: Option<&str>) -> CoreResult<Self> {
        let connection = config.get_connection_config(target)?.resolve();
        let output_dir = root.join(config.get_output_dir(target)?);
        Ok(Self {
            connection,
            tools: config.tools.clone(),
            export: config.export.clone(),
            import: config.import.clone(),
            restore: config.restore.clone(),
            guard: config.guard.clone(),
            output_dir,
        })
    }
}

/// Where the current operation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationPhase {
    #[default]
    Idle,
    Planning,
    ProcessRunning,
    RowImporting,
    Reporting,
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationPhase::Idle => "idle",
            OperationPhase::Planning => "planning",
            OperationPhase::ProcessRunning => "process running",
            OperationPhase::RowImporting => "row importing",
            OperationPhase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

pub struct Orchestrator {
    catalog: Arc<dyn Catalog>,
    runner: Arc<dyn CommandRunner>,
    settings: OpsSettings,
    log: Arc<OperationLog>,
    phase: OperationPhase,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        runner: Arc<dyn CommandRunner>,
        settings: OpsSettings,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            catalog,
            runner,
            settings,
            log,
            phase: OperationPhase::Idle,
        }
    }

    pub fn phase(&self) -> OperationPhase {
        self.phase
    }

    pub fn settings(&self) -> &OpsSettings {
        &self.settings
    }

    pub fn log(&self) -> &Arc<OperationLog> {
        &self.log
    }

    fn enter(&mut self, phase: OperationPhase) {
        log::debug!("Phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn dump_invoker(&self) -> DumpInvoker {
        DumpInvoker::new(
            self.runner.clone(),
            self.settings.connection.clone(),
            self.settings.tools.clone(),
            &self.settings.restore,
            self.log.clone(),
        )
    }

    fn guard(&self) -> SchemaMigrationGuard {
        SchemaMigrationGuard::new(
            self.catalog.clone(),
            self.settings.guard.triggers.clone(),
            self.log.clone(),
        )
    }

    // Catalog browsing

    pub async fn list_databases(&self) -> OpsResult<Vec<String>> {
        Ok(self.catalog.list_databases().await?)
    }

    pub async fn list_schemas(&self, database: &str) -> OpsResult<Vec<String>> {
        self.resolve_database(database).await?;
        Ok(self.catalog.list_schemas(database).await?)
    }

    /// Tables of `schema`, optionally narrowed by a case-insensitive substring.
    pub async fn list_tables(
        &self,
        database: &str,
        schema: &str,
        search: Option<&str>,
    ) -> OpsResult<Vec<String>> {
        self.resolve_database(database).await?;
        let tables = self.catalog.list_tables(database, schema).await?;
        Ok(filter_tables(tables, search))
    }

    /// Fail with [`OpsError::UnknownDatabase`] unless the catalog lists `database`.
    pub async fn resolve_database(&self, database: &str) -> OpsResult<()> {
        let databases = self.catalog.list_databases().await?;
        if databases.iter().any(|d| d == database) {
            Ok(())
        } else {
            Err(OpsError::UnknownDatabase {
                database: database.to_string(),
                available: databases.join(", "),
            })
        }
    }

    // Exports

    /// Whole-object dump: the schema when `tables` is empty, otherwise one
    /// artifact per table.
    pub async fn dump(
        &mut self,
        database: &str,
        schema: &str,
        tables: &[String],
        format: DumpFormat,
        output_dir: Option<&Path>,
    ) -> OpsResult<OperationReport<ExportOutcome>> {
        let result = self
            .run_dump(database, schema, tables, format, output_dir)
            .await;
        self.enter(OperationPhase::Idle);
        result
    }

    async fn run_dump(
        &mut self,
        database: &str,
        schema: &str,
        tables: &[String],
        format: DumpFormat,
        output_dir: Option<&Path>,
    ) -> OpsResult<OperationReport<ExportOutcome>> {
        self.enter(OperationPhase::Planning);
        self.resolve_database(database).await?;
        let targets: Vec<ExportTarget> = if tables.is_empty() {
            vec![ExportTarget::schema(database, schema)]
        } else {
            tables
                .iter()
                .map(|t| ExportTarget::table(database, schema, t.as_str()))
                .collect()
        };
        let output_dir = self.output_dir(output_dir);

        self.enter(OperationPhase::ProcessRunning);
        let invoker = self.dump_invoker();
        let mut report = OperationReport::new("dump");
        for target in &targets {
            report.push(invoker.dump(target, format, &output_dir).await);
        }

        Ok(self.report(report))
    }

    /// Time-filtered per-table CSV export.
    ///
    /// With `tables` unset every table of the schema is considered, in
    /// catalog order. Tables without rows in the window are skipped and
    /// never reach a subprocess.
    pub async fn export_filtered(
        &mut self,
        database: &str,
        schema: &str,
        window: TimeWindow,
        tables: Option<&[String]>,
        output_dir: Option<&Path>,
    ) -> OpsResult<OperationReport<ExportOutcome>> {
        let result = self
            .run_export_filtered(database, schema, window, tables, output_dir)
            .await;
        self.enter(OperationPhase::Idle);
        result
    }

    async fn run_export_filtered(
        &mut self,
        database: &str,
        schema: &str,
        window: TimeWindow,
        tables: Option<&[String]>,
        output_dir: Option<&Path>,
    ) -> OpsResult<OperationReport<ExportOutcome>> {
        self.enter(OperationPhase::Planning);
        self.resolve_database(database).await?;
        let tables = match tables {
            Some(tables) => tables.to_vec(),
            None => self.catalog.list_tables(database, schema).await?,
        };

        let time_column = self.settings.export.time_column.clone();
        let planner = FilteredExportPlanner::new(DataPresenceChecker::new(
            self.catalog.clone(),
            time_column.clone(),
            self.log.clone(),
        ));
        let plan = planner.plan(database, schema, window, &tables).await;

        let mut report = OperationReport::new("export");
        if plan.is_empty() {
            self.log.info(format!(
                "Nothing to export from {}.{} for {}",
                database, schema, window
            ));
            return Ok(self.report(report));
        }

        self.enter(OperationPhase::ProcessRunning);
        let output_dir = self.output_dir(output_dir);
        let invoker = self.dump_invoker();
        for item in plan.items {
            let outcome = match item {
                PlannedExport::Skip(target) => {
                    self.log
                        .info(format!("No rows in window for {}, skipped", target));
                    ExportOutcome::skipped(target)
                }
                PlannedExport::Export(target) => {
                    invoker
                        .export_filtered(&target, &time_column, &output_dir)
                        .await
                }
            };
            report.push(outcome);
        }

        Ok(self.report(report))
    }

    // Restores

    /// Replay one archive or SQL script, then run the trigger guard.
    pub async fn restore(
        &mut self,
        database: &str,
        source: &Path,
    ) -> OpsResult<OperationReport<RestoreOutcome>> {
        let result = self.run_restore(database, source).await;
        self.enter(OperationPhase::Idle);
        result
    }

    async fn run_restore(
        &mut self,
        database: &str,
        source: &Path,
    ) -> OpsResult<OperationReport<RestoreOutcome>> {
        self.enter(OperationPhase::Planning);
        self.resolve_database(database).await?;

        self.enter(OperationPhase::ProcessRunning);
        let mut report = OperationReport::new("restore");
        report.push(self.dump_invoker().restore(database, source).await);

        // Runs whatever the restore's outcome.
        report.guard = self.run_guard(database).await;
        Ok(self.report(report))
    }

    /// Conflict-aware import of snapshot files, each its own target, then
    /// the trigger guard.
    pub async fn import_csv(
        &mut self,
        database: &str,
        files: &[PathBuf],
        key_column: Option<&str>,
    ) -> OpsResult<OperationReport<RestoreOutcome>> {
        let result = self.run_import_csv(database, files, key_column).await;
        self.enter(OperationPhase::Idle);
        result
    }

    async fn run_import_csv(
        &mut self,
        database: &str,
        files: &[PathBuf],
        key_column: Option<&str>,
    ) -> OpsResult<OperationReport<RestoreOutcome>> {
        self.enter(OperationPhase::Planning);
        self.resolve_database(database).await?;

        self.enter(OperationPhase::RowImporting);
        let importer = ConflictAwareCsvImporter::new(
            self.catalog.clone(),
            self.settings.import.clone(),
            self.log.clone(),
        );
        let mut report = OperationReport::new("import");
        for file in files {
            report.push(importer.import_file(database, file, key_column).await);
        }

        report.guard = self.run_guard(database).await;
        Ok(self.report(report))
    }

    async fn run_guard(&self, database: &str) -> Vec<GuardOutcome> {
        let guard = self.guard();
        if guard.triggers().is_empty() {
            log::debug!("No triggers configured, guard has nothing to check");
            return Vec::new();
        }
        guard.ensure_all(database).await
    }

    // Maintenance

    /// `DROP SCHEMA ... CASCADE` after checking the schema exists.
    pub async fn drop_schema(
        &mut self,
        database: &str,
        schema: &str,
    ) -> OpsResult<OperationReport<MaintenanceOutcome>> {
        let result = self.run_drop_schema(database, schema).await;
        self.enter(OperationPhase::Idle);
        result
    }

    async fn run_drop_schema(
        &mut self,
        database: &str,
        schema: &str,
    ) -> OpsResult<OperationReport<MaintenanceOutcome>> {
        self.enter(OperationPhase::Planning);
        self.resolve_database(database).await?;
        let object = format!("{}.{}", database, schema);
        let mut report = OperationReport::new("drop-schema");

        if !self.catalog.schema_exists(database, schema).await? {
            self.log.info(format!("Schema {} not found", object));
            report.push(MaintenanceOutcome {
                object,
                status: OutcomeStatus::SkippedNoData,
            });
            return Ok(self.report(report));
        }

        self.enter(OperationPhase::ProcessRunning);
        let sql = format!("DROP SCHEMA {} CASCADE", quote_ident(schema));
        report.push(self.maintenance(database, object, &sql).await);
        Ok(self.report(report))
    }

    /// `DROP TABLE ... CASCADE` per table, continuing past failures.
    pub async fn drop_tables(
        &mut self,
        database: &str,
        schema: &str,
        tables: &[String],
    ) -> OpsResult<OperationReport<MaintenanceOutcome>> {
        let result = self.run_drop_tables(database, schema, tables).await;
        self.enter(OperationPhase::Idle);
        result
    }

    async fn run_drop_tables(
        &mut self,
        database: &str,
        schema: &str,
        tables: &[String],
    ) -> OpsResult<OperationReport<MaintenanceOutcome>> {
        self.enter(OperationPhase::Planning);
        self.resolve_database(database).await?;

        self.enter(OperationPhase::ProcessRunning);
        let mut report = OperationReport::new("drop-tables");
        for table in tables {
            let object = format!("{}.{}.{}", database, schema, table);
            let sql = format!("DROP TABLE {} CASCADE", quote_qualified(schema, table));
            report.push(self.maintenance(database, object, &sql).await);
        }
        Ok(self.report(report))
    }

    async fn maintenance(&self, database: &str, object: String, sql: &str) -> MaintenanceOutcome {
        let no_params: &[SqlValue] = &[];
        match self.catalog.execute(database, sql, no_params).await {
            Ok(_) => {
                self.log.info(format!("Dropped {}", object));
                MaintenanceOutcome {
                    object,
                    status: OutcomeStatus::Completed,
                }
            }
            Err(e) => {
                self.log.warn(format!("Failed to drop {}: {}", object, e));
                MaintenanceOutcome {
                    object,
                    status: OutcomeStatus::Failed(e.to_string()),
                }
            }
        }
    }

    // Reporting

    fn output_dir(&self, requested: Option<&Path>) -> PathBuf {
        requested
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.settings.output_dir.clone())
    }

    fn report<T: Outcome>(&mut self, report: OperationReport<T>) -> OperationReport<T> {
        self.enter(OperationPhase::Reporting);
        for outcome in &report.outcomes {
            self.log
                .info(format!("{}: {}", outcome.subject(), outcome.status()));
        }
        for guard in &report.guard {
            self.log
                .info(format!("guard {}: {}", guard.trigger, guard.status));
        }
        self.log
            .info(format!("{} finished: {}", report.operation, report.summary()));
        report
    }
}

/// Case-insensitive substring filter; order is preserved.
pub fn filter_tables(tables: Vec<String>, search: Option<&str>) -> Vec<String> {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => {
            let needle = needle.to_lowercase();
            tables
                .into_iter()
                .filter(|t| t.to_lowercase().contains(&needle))
                .collect()
        }
        None => tables,
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
