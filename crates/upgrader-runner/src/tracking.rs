use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::StateLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReceipt {
    pub namespace: String,
    pub priority: u32,
    pub migrated_at_unix: u64,
}

/// Applied-upgrade bookkeeping, one receipt file per migrated upgrade.
#[derive(Debug, Clone)]
pub struct TrackingStore {
    layout: StateLayout,
}

impl TrackingStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn mark_migrated(
        &self,
        namespace: &str,
        priority: u32,
        migrated_at_unix: u64,
    ) -> Result<PathBuf> {
        let receipt = UpgradeReceipt {
            namespace: namespace.to_string(),
            priority,
            migrated_at_unix,
        };
        let dir = self.layout.upgrades_dir();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let path = self.layout.receipt_path(namespace);
        fs::write(&path, serialize_receipt(&receipt).as_bytes())
            .with_context(|| format!("failed to write upgrade receipt: {}", path.display()))?;
        tracing::debug!(upgrade = namespace, path = %path.display(), "recorded upgrade receipt");
        Ok(path)
    }

    pub fn read_receipt(&self, namespace: &str) -> Result<Option<UpgradeReceipt>> {
        let path = self.layout.receipt_path(namespace);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read upgrade receipt: {}", path.display())
                });
            }
        };

        let receipt = parse_receipt(&raw)
            .with_context(|| format!("failed to parse upgrade receipt: {}", path.display()))?;
        Ok(Some(receipt))
    }

    pub fn is_migrated(&self, namespace: &str) -> Result<bool> {
        Ok(self
            .read_receipt(namespace)?
            .is_some_and(|receipt| receipt.namespace == namespace))
    }

    pub fn read_receipts(&self) -> Result<Vec<UpgradeReceipt>> {
        let dir = self.layout.upgrades_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut receipts = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to read upgrade state directory: {}", dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some("receipt") {
                continue;
            }

            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read upgrade receipt: {}", path.display()))?;
            let receipt = parse_receipt(&raw)
                .with_context(|| format!("failed to parse upgrade receipt: {}", path.display()))?;
            receipts.push(receipt);
        }

        receipts.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        Ok(receipts)
    }

    /// Drops the receipt so the upgrade runs again. Returns whether one existed.
    pub fn forget(&self, namespace: &str) -> Result<bool> {
        let path = self.layout.receipt_path(namespace);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(upgrade = namespace, "forgot upgrade receipt");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove upgrade receipt: {}", path.display())),
        }
    }
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}

fn serialize_receipt(receipt: &UpgradeReceipt) -> String {
    format!(
        "namespace={}\npriority={}\nmigrated_at_unix={}\n",
        receipt.namespace, receipt.priority, receipt.migrated_at_unix
    )
}

pub(crate) fn parse_receipt(raw: &str) -> Result<UpgradeReceipt> {
    let mut namespace = None;
    let mut priority = None;
    let mut migrated_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        match k {
            "namespace" => namespace = Some(v.to_string()),
            "priority" => priority = Some(v.parse().context("priority must be u32")?),
            "migrated_at_unix" => {
                migrated_at_unix = Some(v.parse().context("migrated_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    Ok(UpgradeReceipt {
        namespace: namespace.context("missing namespace")?,
        priority: priority.unwrap_or(upgrader_core::DEFAULT_PRIORITY),
        migrated_at_unix: migrated_at_unix.context("missing migrated_at_unix")?,
    })
}
