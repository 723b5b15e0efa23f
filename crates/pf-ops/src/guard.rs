//! Post-restore trigger guard
//!
//! A restore can bring back tables without the triggers later migrations
//! rely on. After every restore or import the configured triggers are looked
//! up and any missing one is created. Guard results are reported on their own
//! and never change a restore outcome.

use pf_core::{GuardOutcome, GuardStatus, OperationLog, TriggerDefinition};
use pf_db::Catalog;
use std::sync::Arc;

pub struct SchemaMigrationGuard {
    catalog: Arc<dyn Catalog>,
    triggers: Vec<TriggerDefinition>,
    log: Arc<OperationLog>,
}

impl SchemaMigrationGuard {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        triggers: Vec<TriggerDefinition>,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            catalog,
            triggers,
            log,
        }
    }

    pub fn triggers(&self) -> &[TriggerDefinition] {
        &self.triggers
    }

    /// Ensure one trigger exists in `database`.
    pub async fn ensure(&self, database: &str, trigger: &TriggerDefinition) -> GuardOutcome {
        let label = format!("{}.{}", trigger.schema, trigger.name);

        let status = match self
            .catalog
            .trigger_exists(database, &trigger.schema, &trigger.name)
            .await
        {
            Ok(true) => {
                log::debug!("Trigger {} present in {}", label, database);
                GuardStatus::AlreadyPresent
            }
            Ok(false) => match self.catalog.execute(database, &trigger.statement, &[]).await {
                Ok(_) => {
                    self.log
                        .info(format!("Created missing trigger {} in {}", label, database));
                    GuardStatus::Created
                }
                Err(e) => {
                    self.log.warn(format!(
                        "Failed to create trigger {} in {}: {}",
                        label, database, e
                    ));
                    GuardStatus::Failed(e.to_string())
                }
            },
            Err(e) => {
                self.log.warn(format!(
                    "Could not check trigger {} in {}: {}",
                    label, database, e
                ));
                GuardStatus::Failed(e.to_string())
            }
        };

        GuardOutcome {
            trigger: label,
            status,
        }
    }

    /// Ensure every configured trigger, in configuration order.
    pub async fn ensure_all(&self, database: &str) -> Vec<GuardOutcome> {
        let mut outcomes = Vec::with_capacity(self.triggers.len());
        for trigger in &self.triggers {
            outcomes.push(self.ensure(database, trigger).await);
        }
        outcomes
    }
}
