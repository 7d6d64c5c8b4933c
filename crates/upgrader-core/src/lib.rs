mod contracts;
mod identity;
mod manifest;
mod status;

pub use contracts::{
    Capabilities, MigratesData, MigratesPostDataMigration, MigratesTable, RollbackTableMigration,
    Upgrade, DEFAULT_PRIORITY,
};
pub use identity::{class_label, package_label, snake_case, title, APP_SEGMENT, SEGMENT_SEPARATOR};
pub use manifest::{UpgradeDeclaration, UpgradeManifest};
pub use status::UpgradeStatus;

#[cfg(test)]
mod tests;
