use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::contracts::Upgrade;
use crate::identity::{class_label, package_label};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeStatus {
    pub is_migrated: bool,
    pub namespace: String,
    pub priority: u32,
    pub changed_at: DateTime<Utc>,
}

impl UpgradeStatus {
    pub fn of(upgrade: &dyn Upgrade) -> Result<Self> {
        let namespace = upgrade.namespace().to_string();
        let is_migrated = upgrade
            .is_migrated()
            .with_context(|| format!("failed to query migrated state of {namespace}"))?;
        let changed_at = upgrade
            .changed_at()
            .with_context(|| format!("failed to query modification time of {namespace}"))?;

        Ok(Self {
            is_migrated,
            priority: upgrade.priority(),
            namespace,
            changed_at,
        })
    }

    pub fn package(&self) -> &str {
        package_label(&self.namespace)
    }

    pub fn class(&self) -> &str {
        class_label(&self.namespace)
    }
}
