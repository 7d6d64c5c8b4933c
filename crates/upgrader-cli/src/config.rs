use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use upgrader_runner::{default_state_dir, StateLayout};

pub(crate) const CONFIG_ENV: &str = "UPGRADER_CONFIG";
pub(crate) const DEFAULT_CONFIG_FILE: &str = "upgrader.toml";
pub(crate) const DEFAULT_MANIFEST_FILE: &str = "upgrades.toml";
pub(crate) const DEFAULT_DATE_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct UpgraderConfig {
    pub(crate) state_dir: Option<PathBuf>,
    pub(crate) date_time_format: String,
    pub(crate) manifests: Vec<PathBuf>,
    pub(crate) transactional: bool,
    #[serde(skip)]
    pub(crate) base_dir: PathBuf,
}

impl Default for UpgraderConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            date_time_format: DEFAULT_DATE_TIME_FORMAT.to_string(),
            manifests: Vec::new(),
            transactional: true,
            base_dir: PathBuf::from("."),
        }
    }
}

impl UpgraderConfig {
    pub(crate) fn from_toml_str(input: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(input).context("failed to parse upgrader config")?;
        validate_date_time_format(&config.date_time_format)?;
        config.base_dir = base_dir.to_path_buf();
        Ok(config)
    }

    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let config = Self::from_toml_str(&raw, base_dir)
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded upgrader config");
        Ok(config)
    }

    pub(crate) fn state_layout(&self) -> Result<StateLayout> {
        let root = match &self.state_dir {
            Some(dir) => self.base_dir.join(dir),
            None => default_state_dir()?,
        };
        Ok(StateLayout::new(root))
    }

    /// Declared manifests; falls back to `upgrades.toml` next to the config
    /// when none are listed and that file exists.
    pub(crate) fn manifest_paths(&self) -> Vec<PathBuf> {
        if self.manifests.is_empty() {
            let fallback = self.base_dir.join(DEFAULT_MANIFEST_FILE);
            return if fallback.is_file() {
                vec![fallback]
            } else {
                Vec::new()
            };
        }

        self.manifests
            .iter()
            .map(|manifest| self.base_dir.join(manifest))
            .collect()
    }
}

/// `--config`, then `$UPGRADER_CONFIG`, then `./upgrader.toml` when present.
pub(crate) fn resolve_config_path(
    explicit: Option<PathBuf>,
    from_env: Option<PathBuf>,
    cwd: &Path,
) -> Option<PathBuf> {
    explicit
        .or(from_env.filter(|path| !path.as_os_str().is_empty()))
        .or_else(|| {
            let candidate = cwd.join(DEFAULT_CONFIG_FILE);
            candidate.is_file().then_some(candidate)
        })
}

fn validate_date_time_format(format: &str) -> Result<()> {
    if format.trim().is_empty() {
        return Err(anyhow!("date_time_format must not be empty"));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(anyhow!("invalid date_time_format: {format}"));
    }
    Ok(())
}
