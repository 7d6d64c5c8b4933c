use anyhow::Result;
use chrono::{DateTime, Utc};

/// Priority reported by upgrades that do not override [`Upgrade::priority`].
pub const DEFAULT_PRIORITY: u32 = 100;

/// A single versioned piece of migration work.
///
/// Phases are optional. An upgrade opts into a phase by implementing the
/// matching capability trait and returning itself from the accessor, e.g.
///
/// ```ignore
/// fn table_migration(&mut self) -> Option<&mut dyn MigratesTable> {
///     Some(self)
/// }
/// ```
pub trait Upgrade {
    /// Backslash separated identity, e.g. `Vendor\Package\Upgrades\AddStatus`.
    fn namespace(&self) -> &str;

    fn is_migrated(&self) -> Result<bool>;

    fn priority(&self) -> u32 {
        DEFAULT_PRIORITY
    }

    fn changed_at(&self) -> Result<DateTime<Utc>>;

    fn table_migration(&mut self) -> Option<&mut dyn MigratesTable> {
        None
    }

    fn data_migration(&mut self) -> Option<&mut dyn MigratesData> {
        None
    }

    fn post_data_migration(&mut self) -> Option<&mut dyn MigratesPostDataMigration> {
        None
    }

    fn table_rollback(&mut self) -> Option<&mut dyn RollbackTableMigration> {
        None
    }
}

/// Schema level change applied outside of any transaction.
pub trait MigratesTable {
    fn migrate_table(&mut self) -> Result<()>;
}

/// Record level change; the runner wraps it in a transaction boundary.
pub trait MigratesData {
    fn migrate_data(&mut self) -> Result<()>;
}

pub trait MigratesPostDataMigration {
    fn migrate_post_data_migration(&mut self) -> Result<()>;
}

/// Compensating action for [`MigratesTable`], invoked when the data or
/// post-data phase fails.
pub trait RollbackTableMigration {
    fn rollback_table_migration(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub migrates_table: bool,
    pub migrates_data: bool,
    pub migrates_post_data: bool,
    pub rollbacks_table: bool,
}

impl Capabilities {
    pub fn of(upgrade: &mut dyn Upgrade) -> Self {
        Self {
            migrates_table: upgrade.table_migration().is_some(),
            migrates_data: upgrade.data_migration().is_some(),
            migrates_post_data: upgrade.post_data_migration().is_some(),
            rollbacks_table: upgrade.table_rollback().is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.migrates_table || self.migrates_data || self.migrates_post_data)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.migrates_table {
            labels.push("table");
        }
        if self.migrates_data {
            labels.push("data");
        }
        if self.migrates_post_data {
            labels.push("post-data");
        }
        if self.rollbacks_table {
            labels.push("rollback");
        }
        labels
    }
}
