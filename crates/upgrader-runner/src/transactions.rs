use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tracking::current_unix_timestamp;
use crate::StateLayout;

const TRANSACTION_METADATA_VERSION: u32 = 1;

static TRANSACTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Atomic boundary around a data migration.
///
/// A failing body aborts the boundary, and the body's error is handed back
/// unchanged.
pub trait TransactionBoundary {
    fn transaction(&mut self, label: &str, body: &mut dyn FnMut() -> Result<()>) -> Result<()>;
}

/// Runs the body as-is, for data stores that manage their own transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TransactionBoundary for Passthrough {
    fn transaction(&mut self, _label: &str, body: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        body()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub version: u32,
    pub txid: String,
    pub operation: String,
    pub status: String,
    pub started_at_unix: u64,
}

/// File journaled transaction: an `active` marker guards against concurrent
/// or interrupted runs, and `<txid>.json` records how the body ended.
#[derive(Debug, Clone)]
pub struct JournalTransaction {
    layout: StateLayout,
}

impl JournalTransaction {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    fn begin(&self, operation: &str) -> Result<TransactionMetadata> {
        let started_at_unix = current_unix_timestamp()?;
        let seq = TRANSACTION_SEQ.fetch_add(1, Ordering::Relaxed);
        let metadata = TransactionMetadata {
            version: TRANSACTION_METADATA_VERSION,
            txid: format!("tx-{started_at_unix}-{}-{seq}", std::process::id()),
            operation: operation.to_string(),
            status: "planning".to_string(),
            started_at_unix,
        };

        let metadata_path = write_transaction_metadata(&self.layout, &metadata)?;
        if let Err(err) = set_active_transaction(&self.layout, &metadata.txid) {
            let _ = fs::remove_file(&metadata_path);
            return Err(err);
        }
        Ok(metadata)
    }
}

impl TransactionBoundary for JournalTransaction {
    fn transaction(&mut self, label: &str, body: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let tx = self.begin(label)?;
        tracing::debug!(txid = %tx.txid, operation = label, "transaction started");

        update_transaction_status(&self.layout, &tx.txid, "applying")?;
        match body() {
            Ok(()) => {
                update_transaction_status(&self.layout, &tx.txid, "committed")?;
                clear_active_transaction(&self.layout)?;
                tracing::debug!(txid = %tx.txid, "transaction committed");
                Ok(())
            }
            Err(err) => {
                if let Err(status_err) = update_transaction_status(&self.layout, &tx.txid, "failed")
                {
                    tracing::warn!(
                        txid = %tx.txid,
                        error = %status_err,
                        "failed to mark transaction as failed"
                    );
                }
                if let Err(clear_err) = clear_active_transaction(&self.layout) {
                    tracing::warn!(
                        txid = %tx.txid,
                        error = %clear_err,
                        "failed to clear active transaction marker"
                    );
                }
                tracing::debug!(txid = %tx.txid, "transaction aborted");
                Err(err)
            }
        }
    }
}

pub fn ensure_no_active_transaction(layout: &StateLayout) -> Result<()> {
    let active_txid = read_active_transaction(layout).map_err(|_| {
        anyhow!(
            "transaction state requires repair (reason=active_marker_unreadable path={})",
            layout.transaction_active_path().display()
        )
    })?;

    let Some(txid) = active_txid else {
        return Ok(());
    };
    let status = read_transaction_metadata(layout, &txid)
        .ok()
        .flatten()
        .map(|metadata| metadata.status)
        .unwrap_or_else(|| "unknown".to_string());
    Err(anyhow!(
        "transaction {txid} is still active (status={status}); remove {} once the data store has been checked",
        layout.transaction_active_path().display()
    ))
}

fn set_active_transaction(layout: &StateLayout, txid: &str) -> Result<PathBuf> {
    let path = layout.transaction_active_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let existing = read_active_transaction(layout).ok().flatten();
            let detail = existing
                .map(|existing_txid| format!(" (txid={existing_txid})"))
                .unwrap_or_default();
            return Err(anyhow!("active transaction marker already exists{detail}"));
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!(
                    "failed to claim active transaction file: {}",
                    path.display()
                )
            });
        }
    };

    file.write_all(format!("{txid}\n").as_bytes())
        .with_context(|| {
            format!(
                "failed to write active transaction file: {}",
                path.display()
            )
        })?;
    file.flush().with_context(|| {
        format!(
            "failed to flush active transaction file: {}",
            path.display()
        )
    })?;

    Ok(path)
}

pub fn read_active_transaction(layout: &StateLayout) -> Result<Option<String>> {
    let path = layout.transaction_active_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read active transaction file: {}", path.display())
            });
        }
    };

    let txid = raw.trim();
    if txid.is_empty() {
        return Ok(None);
    }

    Ok(Some(txid.to_string()))
}

pub fn clear_active_transaction(layout: &StateLayout) -> Result<()> {
    let path = layout.transaction_active_path();
    if path.exists() {
        fs::remove_file(&path).with_context(|| {
            format!(
                "failed to clear active transaction file: {}",
                path.display()
            )
        })?;
    }
    Ok(())
}

fn write_transaction_metadata(
    layout: &StateLayout,
    metadata: &TransactionMetadata,
) -> Result<PathBuf> {
    let path = layout.transaction_metadata_path(&metadata.txid);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let payload =
        serde_json::to_string_pretty(metadata).context("failed to encode transaction metadata")?;
    fs::write(&path, format!("{payload}\n")).with_context(|| {
        format!(
            "failed to write transaction metadata file: {}",
            path.display()
        )
    })?;
    Ok(path)
}

pub fn read_transaction_metadata(
    layout: &StateLayout,
    txid: &str,
) -> Result<Option<TransactionMetadata>> {
    let path = layout.transaction_metadata_path(txid);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| {
                format!(
                    "failed to read transaction metadata file: {}",
                    path.display()
                )
            });
        }
    };

    let metadata = serde_json::from_str(&raw).with_context(|| {
        format!(
            "failed parsing transaction metadata file: {}",
            path.display()
        )
    })?;
    Ok(Some(metadata))
}

fn update_transaction_status(layout: &StateLayout, txid: &str, status: &str) -> Result<()> {
    let mut metadata = read_transaction_metadata(layout, txid)?
        .ok_or_else(|| anyhow!("transaction metadata not found for '{txid}'"))?;
    metadata.status = status.to_string();
    write_transaction_metadata(layout, &metadata)?;
    Ok(())
}
