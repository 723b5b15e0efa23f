//! Configuration types and parsing for pgferry.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no `--target` flag is given.
pub const TARGET_ENV_VAR: &str = "PGFERRY_TARGET";

/// Environment variable that carries the password into client tools.
pub const PASSWORD_CHILD_ENV_VAR: &str = "PGPASSWORD";

/// Main project configuration from pgferry.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Server connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Locations of the external client binaries
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Export defaults
    #[serde(default)]
    pub export: ExportConfig,

    /// Conflict-aware CSV import settings
    #[serde(default)]
    pub import: ImportConfig,

    /// Whole-object restore settings
    #[serde(default)]
    pub restore: RestoreConfig,

    /// Objects re-created after every restore
    #[serde(default)]
    pub guard: GuardConfig,

    /// Operation log settings
    #[serde(default)]
    pub log: LogConfig,

    /// Named target configurations (e.g., plant_a, staging)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Target-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Connection override
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,

    /// Output directory override
    #[serde(default)]
    pub output_dir: Option<String>,
}

/// Database backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// PostgreSQL server (default)
    #[default]
    Postgres,
    /// Local DuckDB file, for offline work and tests
    DuckDb,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::Postgres => write!(f, "postgres"),
            DbType::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Backend type (postgres or duckdb)
    #[serde(rename = "type", default)]
    pub db_type: DbType,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    /// Name of the environment variable holding the password
    #[serde(default = "default_password_env")]
    pub password_env: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// DuckDB file path (or `:memory:`); ignored for postgres
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::default(),
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password_env: default_password_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
            path: None,
        }
    }
}

impl ConnectionConfig {
    /// Resolve the password from the environment and freeze the settings.
    pub fn resolve(&self) -> ConnectionSettings {
        let password = std::env::var(&self.password_env).ok().map(Secret::new);
        if password.is_none() && self.db_type == DbType::Postgres {
            log::debug!(
                "{} is not set; client tools will rely on .pgpass or trust auth",
                self.password_env
            );
        }
        ConnectionSettings {
            db_type: self.db_type,
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            path: self.path.clone().unwrap_or_else(|| ":memory:".to_string()),
        }
    }
}

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to a driver or child process environment.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// Connection parameters with the password already resolved.
///
/// This value is threaded explicitly into every catalog connection and
/// subprocess invocation; nothing reads credentials from ambient state later.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub db_type: DbType,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<Secret>,
    pub connect_timeout: Duration,
    pub path: String,
}

/// External client binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    PgDump,
    PgRestore,
    Psql,
}

/// Locations of the external client binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Directory holding the binaries; when unset they are looked up on PATH
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,

    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,

    #[serde(default = "default_pg_restore")]
    pub pg_restore: String,

    #[serde(default = "default_psql")]
    pub psql: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bin_dir: None,
            pg_dump: default_pg_dump(),
            pg_restore: default_pg_restore(),
            psql: default_psql(),
        }
    }
}

impl ToolsConfig {
    /// Program path for a tool, joined onto `bin_dir` when one is configured.
    pub fn program(&self, tool: Tool) -> PathBuf {
        let name = match tool {
            Tool::PgDump => &self.pg_dump,
            Tool::PgRestore => &self.pg_restore,
            Tool::Psql => &self.psql,
        };
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Dump artifact format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// Plain SQL script, restored with psql
    #[default]
    Plain,
    /// Custom archive, restored with pg_restore
    Custom,
}

impl DumpFormat {
    /// Value for pg_dump's `--format`.
    pub fn pg_dump_flag(&self) -> &'static str {
        match self {
            DumpFormat::Plain => "p",
            DumpFormat::Custom => "c",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DumpFormat::Plain => "sql",
            DumpFormat::Custom => "dump",
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpFormat::Plain => write!(f, "plain"),
            DumpFormat::Custom => write!(f, "custom"),
        }
    }
}

/// Export defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Timestamp column used by time-filtered exports
    #[serde(default = "default_time_column")]
    pub time_column: String,

    #[serde(default)]
    pub dump_format: DumpFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            time_column: default_time_column(),
            dump_format: DumpFormat::default(),
        }
    }
}

/// Conflict-aware CSV import settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Primary-key column the upsert conflicts on
    #[serde(default = "default_key_column")]
    pub key_column: String,

    /// Column whose cells are parsed as timestamps (none when unset)
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            key_column: default_key_column(),
            timestamp_column: default_timestamp_column(),
        }
    }
}

/// Whole-object restore settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreConfig {
    /// Stop the restore tool at the first failing statement
    #[serde(default)]
    pub stop_on_error: bool,
}

/// Objects the post-restore guard keeps in place
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
}

/// A trigger that must exist after every restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerDefinition {
    pub schema: String,
    pub name: String,
    /// Fully-qualified CREATE TRIGGER statement
    pub statement: String,
}

/// Operation log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_password_env() -> String {
    "PGFERRY_PASSWORD".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_pg_dump() -> String {
    "pg_dump".to_string()
}

fn default_pg_restore() -> String {
    "pg_restore".to_string()
}

fn default_psql() -> String {
    "psql".to_string()
}

fn default_output_dir() -> String {
    "backups".to_string()
}

fn default_time_column() -> String {
    "sys_tag_log_time".to_string()
}

fn default_key_column() -> String {
    "sys_tag_log_id".to_string()
}

fn default_timestamp_column() -> Option<String> {
    Some("sys_tag_log_time".to_string())
}

fn default_log_path() -> String {
    "pgferry.log".to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for pgferry.yml or pgferry.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("pgferry.yml");
        let yaml_path = dir.join("pgferry.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Project name cannot be empty".to_string(),
            });
        }

        let connections =
            std::iter::once(("connection", &self.connection)).chain(self.targets.iter().filter_map(
                |(name, target)| target.connection.as_ref().map(|c| (name.as_str(), c)),
            ));
        for (label, connection) in connections {
            if connection.port == 0 {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{}: port must be non-zero", label),
                });
            }
        }

        if self.import.key_column.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "import.key_column cannot be empty".to_string(),
            });
        }

        if self.export.time_column.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "export.time_column cannot be empty".to_string(),
            });
        }

        for trigger in &self.guard.triggers {
            if trigger.name.trim().is_empty() || trigger.statement.trim().is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "guard trigger in schema '{}' needs both a name and a statement",
                        trigger.schema
                    ),
                });
            }
        }

        Ok(())
    }

    fn target_config(&self, name: &str) -> CoreResult<&TargetConfig> {
        self.targets.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.targets.keys().map(|k| k.as_str()).collect();
            available.sort_unstable();
            CoreError::ConfigInvalid {
                message: format!(
                    "Target '{}' not found. Available targets: {}",
                    name,
                    available.join(", ")
                ),
            }
        })
    }

    /// Get connection configuration, optionally applying a target override
    pub fn get_connection_config(&self, target: Option<&str>) -> CoreResult<ConnectionConfig> {
        match target {
            Some(name) => Ok(self
                .target_config(name)?
                .connection
                .clone()
                .unwrap_or_else(|| self.connection.clone())),
            None => Ok(self.connection.clone()),
        }
    }

    /// Get the export output directory, optionally applying a target override
    pub fn get_output_dir(&self, target: Option<&str>) -> CoreResult<&str> {
        match target {
            Some(name) => Ok(self
                .target_config(name)?
                .output_dir
                .as_deref()
                .unwrap_or(&self.export.output_dir)),
            None => Ok(&self.export.output_dir),
        }
    }

    /// Operation log path resolved against a project root
    pub fn log_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.log.path)
    }

    /// Resolve the active target from the CLI flag or `PGFERRY_TARGET`
    pub fn resolve_target(cli_target: Option<&str>) -> Option<String> {
        cli_target
            .map(String::from)
            .or_else(|| std::env::var(TARGET_ENV_VAR).ok())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
