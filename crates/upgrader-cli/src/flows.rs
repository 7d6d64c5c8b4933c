use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use upgrader_runner::{
    current_unix_timestamp, ensure_no_active_transaction, load_declared_upgrades,
    JournalTransaction, NoticeSink, Passthrough, RunOutcome, RunReport, Runner, StateLayout,
    TrackingStore, TransactionBoundary, UpgradeReceipt, UpgradeRegistry,
};

use crate::config::UpgraderConfig;
use crate::render::{render_status_table, OutputStyle};

pub(crate) struct Session {
    pub(crate) config: UpgraderConfig,
    pub(crate) layout: StateLayout,
    pub(crate) store: TrackingStore,
    pub(crate) registry: UpgradeRegistry,
}

pub(crate) fn open_session(config: UpgraderConfig) -> Result<Session> {
    let layout = config.state_layout()?;
    let store = TrackingStore::new(layout.clone());

    let mut registry = UpgradeRegistry::new();
    for manifest_path in config.manifest_paths() {
        for upgrade in load_declared_upgrades(&manifest_path, &store)? {
            registry.register(upgrade).with_context(|| {
                format!("failed to register upgrades from {}", manifest_path.display())
            })?;
        }
    }
    tracing::debug!(
        state_dir = %layout.root().display(),
        upgrades = registry.len(),
        "opened upgrader session"
    );

    let session = Session {
        config,
        layout,
        store,
        registry,
    };
    for receipt in orphaned_receipts(&session)? {
        tracing::warn!(
            upgrade = %receipt.namespace,
            migrated_at_unix = receipt.migrated_at_unix,
            "receipt belongs to no registered upgrade"
        );
    }
    Ok(session)
}

/// Receipts recorded for namespaces no manifest declares any more.
pub(crate) fn orphaned_receipts(session: &Session) -> Result<Vec<UpgradeReceipt>> {
    Ok(session
        .store
        .read_receipts()?
        .into_iter()
        .filter(|receipt| {
            !session
                .registry
                .iter()
                .any(|upgrade| upgrade.namespace() == receipt.namespace)
        })
        .collect())
}

pub(crate) fn run_status_command(
    session: &Session,
    style: OutputStyle,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let statuses = session.registry.list_status()?;
    Ok(render_status_table(
        &statuses,
        style,
        &Local,
        &session.config.date_time_format,
        now,
    ))
}

pub(crate) fn run_upgrade_command(
    session: &mut Session,
    selector: &str,
    sink: &mut dyn NoticeSink,
) -> Result<RunOutcome> {
    ensure_no_active_transaction(&session.layout)?;
    let mut transactions = transaction_boundary(&session.config, &session.layout);

    let upgrade = session.registry.find_mut(selector)?;
    let outcome = Runner::new(sink, transactions.as_mut()).handle(&mut *upgrade)?;
    if matches!(outcome, RunOutcome::Completed { .. }) {
        session.store.mark_migrated(
            upgrade.namespace(),
            upgrade.priority(),
            current_unix_timestamp()?,
        )?;
    }
    Ok(outcome)
}

pub(crate) fn run_pending_command(
    session: &mut Session,
    sink: &mut dyn NoticeSink,
) -> Result<Vec<RunReport>> {
    ensure_no_active_transaction(&session.layout)?;
    let mut transactions = transaction_boundary(&session.config, &session.layout);
    let mut runner = Runner::new(sink, transactions.as_mut());

    let store = &session.store;
    session
        .registry
        .run_all(&mut runner, |namespace, priority| {
            store.mark_migrated(namespace, priority, current_unix_timestamp()?)?;
            Ok(())
        })
}

/// Drops the tracking receipt of an upgrade so the next run applies it again.
pub(crate) fn run_forget_command(session: &mut Session, selector: &str) -> Result<(String, bool)> {
    let namespace = session.registry.find_mut(selector)?.namespace().to_string();
    let forgotten = session.store.forget(&namespace)?;
    Ok((namespace, forgotten))
}

fn transaction_boundary(
    config: &UpgraderConfig,
    layout: &StateLayout,
) -> Box<dyn TransactionBoundary> {
    if config.transactional {
        Box::new(JournalTransaction::new(layout.clone()))
    } else {
        Box::new(Passthrough)
    }
}
