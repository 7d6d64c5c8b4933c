mod declared;
mod layout;
mod notice;
mod registry;
mod runner;
mod tracking;
mod transactions;

pub use declared::{load_declared_upgrades, DeclaredUpgrade};
pub use layout::{default_state_dir, StateLayout};
pub use notice::{NoticeLevel, NoticeSink, RecordingSink, SilentSink};
pub use registry::{RunReport, UpgradeRegistry};
pub use runner::{RunOutcome, Runner};
pub use tracking::{current_unix_timestamp, TrackingStore, UpgradeReceipt};
pub use transactions::{
    clear_active_transaction, ensure_no_active_transaction, read_active_transaction,
    read_transaction_metadata, JournalTransaction, Passthrough, TransactionBoundary,
    TransactionMetadata,
};
