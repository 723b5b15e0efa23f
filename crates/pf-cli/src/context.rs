//! Runtime context for CLI commands

use anyhow::{Context, Result};
use pf_core::{Config, DbType, OperationLog};
use pf_ops::{Orchestrator, OpsSettings, ProcessRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Loaded configuration plus a ready orchestrator
pub(crate) struct RuntimeContext {
    pub root: PathBuf,
    pub orchestrator: Orchestrator,
}

impl RuntimeContext {
    /// Load the project configuration, open the operation log and connect.
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&global.project_dir);

        let config = match &global.config {
            Some(path) => {
                Config::load(Path::new(path)).context("Failed to load configuration file")?
            }
            None => Config::load_from_dir(&root).context("Failed to load project configuration")?,
        };

        let target = Config::resolve_target(global.target.as_deref());
        if let Some(target) = &target {
            log::debug!("Using target '{}'", target);
        }

        let mut settings = OpsSettings::from_config(&config, &root, target.as_deref())
            .context("Failed to resolve target configuration")?;
        if settings.connection.db_type == DbType::DuckDb && settings.connection.path != ":memory:" {
            settings.connection.path = root
                .join(&settings.connection.path)
                .display()
                .to_string();
        }

        let log_path = config.log_path_absolute(&root);
        let log = Arc::new(
            OperationLog::open(&log_path)
                .with_context(|| format!("Failed to open operation log {}", log_path.display()))?,
        );

        let catalog = pf_db::connect(settings.connection.clone())
            .context("Failed to connect to database")?;
        log::debug!(
            "Connected to {} as {} ({})",
            settings.connection.host,
            settings.connection.user,
            catalog.backend_name()
        );

        let orchestrator = Orchestrator::new(catalog, Arc::new(ProcessRunner), settings, log);

        Ok(Self { root, orchestrator })
    }

    /// Resolve a user-supplied directory against the project root.
    pub fn resolve_dir(&self, dir: Option<&str>) -> Option<PathBuf> {
        dir.map(|d| self.root.join(d))
    }
}
