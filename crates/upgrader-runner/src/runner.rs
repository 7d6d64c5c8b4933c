use anyhow::Result;
use std::time::Instant;
use upgrader_core::{title, Capabilities, Upgrade};

use crate::{NoticeSink, TransactionBoundary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    AlreadyMigrated,
    Completed { elapsed_ms: u64 },
}

/// Executes one upgrade: table migration, transactional data migration and
/// post-data migration, each only when the upgrade declares it.
///
/// Only data and post-data failures trigger the table rollback. A failing
/// table migration propagates untouched.
pub struct Runner<'a> {
    sink: &'a mut dyn NoticeSink,
    transactions: &'a mut dyn TransactionBoundary,
}

impl<'a> Runner<'a> {
    pub fn new(
        sink: &'a mut dyn NoticeSink,
        transactions: &'a mut dyn TransactionBoundary,
    ) -> Self {
        Self { sink, transactions }
    }

    pub fn handle(&mut self, upgrade: &mut dyn Upgrade) -> Result<RunOutcome> {
        let namespace = upgrade.namespace().to_string();
        let title = title(&namespace);

        if upgrade.is_migrated()? {
            tracing::debug!(upgrade = %namespace, "upgrade already migrated");
            self.sink.info(&format!("{title} has been already done"));
            return Ok(RunOutcome::AlreadyMigrated);
        }

        let capabilities = Capabilities::of(&mut *upgrade);
        if capabilities.is_empty() {
            tracing::warn!(upgrade = %namespace, "upgrade declares no migration phase");
        }

        let started_at = Instant::now();
        tracing::info!(
            upgrade = %namespace,
            phases = ?capabilities.labels(),
            "upgrade starting"
        );
        self.sink.info(&format!("{title} is starting"));

        if let Some(table) = upgrade.table_migration() {
            table.migrate_table()?;
        }

        let migrated = (|| -> Result<()> {
            if let Some(data) = upgrade.data_migration() {
                self.transactions
                    .transaction(&title, &mut || data.migrate_data())?;
            }
            if let Some(post_data) = upgrade.post_data_migration() {
                post_data.migrate_post_data_migration()?;
            }
            Ok(())
        })();

        if let Err(err) = migrated {
            tracing::warn!(upgrade = %namespace, error = %err, "upgrade failed");
            if let Some(rollback) = upgrade.table_rollback() {
                tracing::info!(upgrade = %namespace, "rolling back table migration");
                rollback.rollback_table_migration()?;
            }
            self.sink
                .error(&format!("{title} was unsuccessfully, doing rollback"));
            return Err(err);
        }

        let elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(upgrade = %namespace, elapsed_ms, "upgrade done");
        self.sink.info(&format!("{title} was done ({elapsed_ms} ms)"));
        Ok(RunOutcome::Completed { elapsed_ms })
    }
}
