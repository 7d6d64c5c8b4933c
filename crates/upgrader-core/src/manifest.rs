use std::collections::HashSet;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::DEFAULT_PRIORITY;
use crate::identity::SEGMENT_SEPARATOR;

/// A set of command backed upgrades declared in `upgrades.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpgradeManifest {
    #[serde(default, rename = "upgrade")]
    pub upgrades: Vec<UpgradeDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UpgradeDeclaration {
    pub namespace: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// RFC 3339 string; the manifest file's mtime is used when absent.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check: Option<Vec<String>>,
    #[serde(default)]
    pub migrate_table: Option<Vec<String>>,
    #[serde(default)]
    pub migrate_data: Option<Vec<String>>,
    #[serde(default)]
    pub migrate_post_data: Option<Vec<String>>,
    #[serde(default)]
    pub rollback_table: Option<Vec<String>>,
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl UpgradeManifest {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse upgrade manifest")?;

        let mut seen = HashSet::new();
        for declaration in &manifest.upgrades {
            declaration.validate()?;
            if !seen.insert(declaration.namespace.as_str()) {
                return Err(anyhow!(
                    "duplicate upgrade declaration '{}'",
                    declaration.namespace
                ));
            }
        }

        Ok(manifest)
    }
}

impl UpgradeDeclaration {
    fn validate(&self) -> anyhow::Result<()> {
        validate_namespace(&self.namespace)?;

        let commands = [
            ("check", &self.check),
            ("migrate_table", &self.migrate_table),
            ("migrate_data", &self.migrate_data),
            ("migrate_post_data", &self.migrate_post_data),
            ("rollback_table", &self.rollback_table),
        ];
        for (field, argv) in commands {
            let Some(argv) = argv else {
                continue;
            };
            let program = argv.first().map(|program| program.trim()).unwrap_or_default();
            if program.is_empty() {
                return Err(anyhow!(
                    "upgrade '{}' declares an empty {field} command",
                    self.namespace
                ));
            }
        }

        if self.migrate_table.is_none()
            && self.migrate_data.is_none()
            && self.migrate_post_data.is_none()
        {
            return Err(anyhow!(
                "upgrade '{}' declares no migration phase",
                self.namespace
            ));
        }

        Ok(())
    }
}

fn validate_namespace(namespace: &str) -> anyhow::Result<()> {
    if namespace.trim().is_empty() {
        return Err(anyhow!("upgrade namespace must not be empty"));
    }
    if namespace
        .split(SEGMENT_SEPARATOR)
        .any(|segment| segment.trim().is_empty())
    {
        return Err(anyhow!(
            "upgrade namespace contains an empty segment: {namespace}"
        ));
    }
    if let Some(invalid) = namespace
        .chars()
        .find(|ch| *ch != SEGMENT_SEPARATOR && !ch.is_ascii_alphanumeric() && *ch != '_')
    {
        return Err(anyhow!(
            "upgrade namespace contains invalid character '{invalid}': {namespace}"
        ));
    }

    Ok(())
}
