//! Command lines for whole-object dumps, filtered CSV exports and restores
//!
//! Every invocation carries the connection as arguments and the password as
//! `PGPASSWORD` in the child's environment only. Identifiers are quoted with
//! the same rules as generated SQL.

use crate::process::{CommandRunner, FailurePolicy, ProcessInvocation};
use pf_core::sql_utils::{quote_ident, quote_literal, quote_qualified};
use pf_core::{
    ConnectionSettings, DumpFormat, ExportOutcome, ExportTarget, OperationLog, RestoreConfig,
    RestoreOutcome, TimeWindow, Tool, ToolsConfig, PASSWORD_CHILD_ENV_VAR,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TIMESTAMP_LITERAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct DumpInvoker {
    runner: Arc<dyn CommandRunner>,
    connection: ConnectionSettings,
    tools: ToolsConfig,
    stop_on_error: bool,
    log: Arc<OperationLog>,
}

impl DumpInvoker {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        connection: ConnectionSettings,
        tools: ToolsConfig,
        restore: &RestoreConfig,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            runner,
            connection,
            tools,
            stop_on_error: restore.stop_on_error,
            log,
        }
    }

    fn connection_args(&self, database: &str) -> Vec<String> {
        vec![
            "--host".to_string(),
            self.connection.host.clone(),
            "--port".to_string(),
            self.connection.port.to_string(),
            "--username".to_string(),
            self.connection.user.clone(),
            "--no-password".to_string(),
            "--dbname".to_string(),
            database.to_string(),
        ]
    }

    fn with_credentials(&self, invocation: ProcessInvocation) -> ProcessInvocation {
        match &self.connection.password {
            Some(password) => invocation.env_secret(PASSWORD_CHILD_ENV_VAR, password.clone()),
            None => invocation,
        }
    }

    fn psql(&self, database: &str) -> ProcessInvocation {
        ProcessInvocation::new(self.tools.program(Tool::Psql))
            .args(self.connection_args(database))
            .arg("--no-psqlrc")
    }

    /// pg_dump for a whole schema, or a single table when the target names one.
    pub fn dump_invocation(
        &self,
        target: &ExportTarget,
        format: DumpFormat,
        artifact: &Path,
    ) -> ProcessInvocation {
        let invocation = ProcessInvocation::new(self.tools.program(Tool::PgDump))
            .args(self.connection_args(&target.database))
            .arg(format!("--format={}", format.pg_dump_flag()))
            .arg("--file")
            .arg(artifact.display().to_string());
        let invocation = match &target.table {
            Some(table) => invocation
                .arg("--table")
                .arg(quote_qualified(&target.schema, table)),
            None => invocation.arg("--schema").arg(quote_ident(&target.schema)),
        };
        self.with_credentials(invocation)
    }

    /// psql fed a `\copy (SELECT ...) TO 'file' WITH CSV HEADER` script, so the
    /// window filter runs on the server.
    pub fn export_invocation(
        &self,
        database: &str,
        schema: &str,
        table: &str,
        time_column: &str,
        window: Option<&TimeWindow>,
        artifact: &Path,
    ) -> ProcessInvocation {
        let mut select = format!("SELECT * FROM {}", quote_qualified(schema, table));
        if let Some(window) = window {
            let column = quote_ident(time_column);
            select.push_str(&format!(
                " WHERE {} >= {} AND {} < {}",
                column,
                quote_literal(&window.lower_bound().format(TIMESTAMP_LITERAL_FORMAT).to_string()),
                column,
                quote_literal(
                    &window
                        .upper_bound_exclusive()
                        .format(TIMESTAMP_LITERAL_FORMAT)
                        .to_string()
                ),
            ));
        }
        let script = format!(
            "\\copy ({}) TO {} WITH CSV HEADER\n",
            select,
            psql_path_literal(artifact)
        );

        let invocation = self
            .psql(database)
            .args(["--quiet", "-v", "ON_ERROR_STOP=1"])
            .stdin_script(script);
        self.with_credentials(invocation)
    }

    /// `.sql` files replay through psql, anything else through pg_restore.
    pub fn restore_invocation(&self, database: &str, source: &Path) -> ProcessInvocation {
        let invocation = if is_plain_sql(source) {
            let invocation = self.psql(database).arg("--quiet");
            let invocation = if self.stop_on_error {
                invocation.args(["-v", "ON_ERROR_STOP=1"])
            } else {
                invocation
            };
            invocation.arg("--file").arg(source.display().to_string())
        } else {
            let invocation = ProcessInvocation::new(self.tools.program(Tool::PgRestore))
                .args(self.connection_args(database));
            let invocation = if self.stop_on_error {
                invocation.arg("--exit-on-error")
            } else {
                invocation
            };
            invocation.arg(source.display().to_string())
        };
        self.with_credentials(invocation)
    }

    /// Dump one schema or table into `output_dir`.
    ///
    /// Every failure, including a tool that cannot be launched, is a `Failed`
    /// outcome for this target.
    pub async fn dump(
        &self,
        target: &ExportTarget,
        format: DumpFormat,
        output_dir: &Path,
    ) -> ExportOutcome {
        let artifact = output_dir.join(target.artifact_file_name(format.extension()));
        if let Err(reason) = prepare_output_dir(output_dir).await {
            return self.export_failed(target, reason);
        }

        self.log
            .info(format!("Dumping {} to {}", target, artifact.display()));
        let invocation = self.dump_invocation(target, format, &artifact);
        self.finish_export(target, artifact, &invocation).await
    }

    /// Export one table's rows inside the target's window as CSV.
    pub async fn export_filtered(
        &self,
        target: &ExportTarget,
        time_column: &str,
        output_dir: &Path,
    ) -> ExportOutcome {
        let Some(table) = target.table.as_deref() else {
            return self.export_failed(target, "filtered export needs a table".to_string());
        };
        let artifact = output_dir.join(target.artifact_file_name("csv"));
        if let Err(reason) = prepare_output_dir(output_dir).await {
            return self.export_failed(target, reason);
        }

        self.log
            .info(format!("Exporting {} to {}", target, artifact.display()));
        let invocation = self.export_invocation(
            &target.database,
            &target.schema,
            table,
            time_column,
            target.window.as_ref(),
            &artifact,
        );
        self.finish_export(target, artifact, &invocation).await
    }

    /// Replay an archive or SQL script into `database`. Judged by exit code only.
    pub async fn restore(&self, database: &str, source: &Path) -> RestoreOutcome {
        let outcome = RestoreOutcome::new(database, source);
        if !source.is_file() {
            let reason = format!("file not found: {}", source.display());
            self.log.warn(format!("Restore into {} failed: {}", database, reason));
            return outcome.failed(reason);
        }

        self.log
            .info(format!("Restoring {} into {}", source.display(), database));
        let invocation = self.restore_invocation(database, source);
        match self.run(&invocation, FailurePolicy::ExitCodeOnly).await {
            None => {
                self.log.info(format!(
                    "Restore completed: {} -> {}",
                    source.display(),
                    database
                ));
                outcome
            }
            Some(reason) => {
                self.log.warn(format!(
                    "Restore failed: {} -> {}: {}",
                    source.display(),
                    database,
                    reason
                ));
                outcome.failed(reason)
            }
        }
    }

    async fn finish_export(
        &self,
        target: &ExportTarget,
        artifact: PathBuf,
        invocation: &ProcessInvocation,
    ) -> ExportOutcome {
        match self.run(invocation, FailurePolicy::StderrOrExitCode).await {
            None => {
                self.log.info(format!(
                    "Export completed: {} -> {}",
                    target.label(),
                    artifact.display()
                ));
                ExportOutcome::completed(target.clone(), artifact)
            }
            Some(reason) => {
                // Drop any partial artifact.
                if tokio::fs::remove_file(&artifact).await.is_ok() {
                    log::debug!("Removed partial artifact {}", artifact.display());
                }
                self.export_failed(target, reason)
            }
        }
    }

    fn export_failed(&self, target: &ExportTarget, reason: String) -> ExportOutcome {
        self.log
            .warn(format!("Export failed for {}: {}", target.label(), reason));
        ExportOutcome::failed(target.clone(), reason)
    }

    /// Run and classify. `None` is success, `Some(reason)` a failed run.
    /// A child that cannot be launched, or is lost while running, is a
    /// failed run too.
    async fn run(&self, invocation: &ProcessInvocation, policy: FailurePolicy) -> Option<String> {
        log::debug!("{}", invocation.display_command());
        match self.runner.run(invocation).await {
            Ok(output) => output.failure_reason(policy),
            Err(e) => Some(e.to_string()),
        }
    }
}

async fn prepare_output_dir(dir: &Path) -> Result<(), String> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("cannot create output directory {}: {}", dir.display(), e))
}

fn is_plain_sql(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
}

/// psql treats backslashes inside single-quoted meta-command arguments as
/// escapes, so they are doubled before quoting.
fn psql_path_literal(path: &Path) -> String {
    quote_literal(&path.display().to_string().replace('\\', "\\\\"))
}

#[cfg(test)]
#[path = "dump_test.rs"]
mod tests;
