use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn upgrades_dir(&self) -> PathBuf {
        self.root.join("upgrades")
    }

    pub fn receipt_path(&self, namespace: &str) -> PathBuf {
        self.upgrades_dir()
            .join(format!("{}.receipt", receipt_file_stem(namespace)))
    }

    pub fn transactions_dir(&self) -> PathBuf {
        self.root.join("transactions")
    }

    pub fn transaction_active_path(&self) -> PathBuf {
        self.transactions_dir().join("active")
    }

    pub fn transaction_metadata_path(&self, txid: &str) -> PathBuf {
        self.transactions_dir().join(format!("{txid}.json"))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.upgrades_dir(), self.transactions_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// `Vendor\Package\Add-Column` -> `Vendor--Package--Add%2DColumn`
///
/// Bytes outside `[A-Za-z0-9_]` are percent-encoded, so distinct namespaces
/// never share a receipt file.
fn receipt_file_stem(namespace: &str) -> String {
    namespace
        .split('\\')
        .map(|segment| {
            let mut encoded = String::with_capacity(segment.len());
            for byte in segment.bytes() {
                if byte.is_ascii_alphanumeric() || byte == b'_' {
                    encoded.push(char::from(byte));
                } else {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
            encoded
        })
        .collect::<Vec<_>>()
        .join("--")
}

pub fn default_state_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows state directory")?;
        return Ok(PathBuf::from(app_data).join("Upgrader"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state directory")?;
    Ok(PathBuf::from(home).join(".upgrader"))
}
