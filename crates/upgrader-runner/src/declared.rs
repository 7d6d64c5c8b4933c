use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use upgrader_core::{
    MigratesData, MigratesPostDataMigration, MigratesTable, RollbackTableMigration, Upgrade,
    UpgradeDeclaration, UpgradeManifest,
};

use crate::TrackingStore;

/// Upgrade whose phases are external commands declared in a manifest.
///
/// Commands run from the manifest's directory with `UPGRADER_NAMESPACE` and
/// `UPGRADER_PHASE` set. Without a `check` command the migrated state comes
/// from the tracking store.
#[derive(Debug, Clone)]
pub struct DeclaredUpgrade {
    declaration: UpgradeDeclaration,
    working_dir: PathBuf,
    manifest_changed_at: DateTime<Utc>,
    store: TrackingStore,
}

impl DeclaredUpgrade {
    pub fn new(
        declaration: UpgradeDeclaration,
        working_dir: impl Into<PathBuf>,
        manifest_changed_at: DateTime<Utc>,
        store: TrackingStore,
    ) -> Self {
        Self {
            declaration,
            working_dir: working_dir.into(),
            manifest_changed_at,
            store,
        }
    }

    fn command(&self, phase: &str, argv: &[String]) -> Result<Command> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            anyhow!(
                "{phase} command of {} is empty",
                self.declaration.namespace
            )
        })?;
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.working_dir)
            .env("UPGRADER_NAMESPACE", &self.declaration.namespace)
            .env("UPGRADER_PHASE", phase);
        Ok(command)
    }

    fn run_phase(&self, phase: &str, argv: Option<&Vec<String>>) -> Result<()> {
        let argv = argv.ok_or_else(|| {
            anyhow!(
                "{} does not declare a {phase} command",
                self.declaration.namespace
            )
        })?;
        tracing::debug!(
            upgrade = %self.declaration.namespace,
            phase,
            command = ?argv,
            "running upgrade phase"
        );
        let mut command = self.command(phase, argv)?;
        run_command(
            &mut command,
            &format!("{phase} failed for {}", self.declaration.namespace),
        )
    }
}

impl Upgrade for DeclaredUpgrade {
    fn namespace(&self) -> &str {
        &self.declaration.namespace
    }

    fn is_migrated(&self) -> Result<bool> {
        let Some(argv) = &self.declaration.check else {
            return self.store.is_migrated(&self.declaration.namespace);
        };

        let status = self
            .command("check", argv)?
            .output()
            .with_context(|| {
                format!(
                    "check failed for {}: command failed to start",
                    self.declaration.namespace
                )
            })?
            .status;
        Ok(status.success())
    }

    fn priority(&self) -> u32 {
        self.declaration.priority
    }

    fn changed_at(&self) -> Result<DateTime<Utc>> {
        Ok(self
            .declaration
            .changed_at
            .unwrap_or(self.manifest_changed_at))
    }

    fn table_migration(&mut self) -> Option<&mut dyn MigratesTable> {
        if self.declaration.migrate_table.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn data_migration(&mut self) -> Option<&mut dyn MigratesData> {
        if self.declaration.migrate_data.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn post_data_migration(&mut self) -> Option<&mut dyn MigratesPostDataMigration> {
        if self.declaration.migrate_post_data.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn table_rollback(&mut self) -> Option<&mut dyn RollbackTableMigration> {
        if self.declaration.rollback_table.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl MigratesTable for DeclaredUpgrade {
    fn migrate_table(&mut self) -> Result<()> {
        self.run_phase("migrate_table", self.declaration.migrate_table.as_ref())
    }
}

impl MigratesData for DeclaredUpgrade {
    fn migrate_data(&mut self) -> Result<()> {
        self.run_phase("migrate_data", self.declaration.migrate_data.as_ref())
    }
}

impl MigratesPostDataMigration for DeclaredUpgrade {
    fn migrate_post_data_migration(&mut self) -> Result<()> {
        self.run_phase(
            "migrate_post_data",
            self.declaration.migrate_post_data.as_ref(),
        )
    }
}

impl RollbackTableMigration for DeclaredUpgrade {
    fn rollback_table_migration(&mut self) -> Result<()> {
        self.run_phase("rollback_table", self.declaration.rollback_table.as_ref())
    }
}

/// Reads a manifest and builds one [`DeclaredUpgrade`] per declaration, in
/// declaration order.
pub fn load_declared_upgrades(
    manifest_path: &Path,
    store: &TrackingStore,
) -> Result<Vec<DeclaredUpgrade>> {
    let raw = fs::read_to_string(manifest_path).with_context(|| {
        format!(
            "failed to read upgrade manifest: {}",
            manifest_path.display()
        )
    })?;
    let manifest = UpgradeManifest::from_toml_str(&raw)
        .with_context(|| format!("invalid upgrade manifest: {}", manifest_path.display()))?;

    let modified = fs::metadata(manifest_path)
        .and_then(|metadata| metadata.modified())
        .with_context(|| {
            format!(
                "failed to read modification time: {}",
                manifest_path.display()
            )
        })?;
    let manifest_changed_at = DateTime::<Utc>::from(modified);
    let working_dir = manifest_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    tracing::debug!(
        manifest = %manifest_path.display(),
        upgrades = manifest.upgrades.len(),
        "loaded upgrade manifest"
    );

    Ok(manifest
        .upgrades
        .into_iter()
        .map(|declaration| {
            DeclaredUpgrade::new(
                declaration,
                working_dir.clone(),
                manifest_changed_at,
                store.clone(),
            )
        })
        .collect())
}

fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
