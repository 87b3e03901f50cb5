use driftnet_backup::BackupError;
use driftnet_ledger::LedgerError;

/// Errors that abort a pipeline worker.
///
/// Item-level failures (transient lookups, malformed items, confirmation
/// failures) never surface here; they are logged and absorbed at the item
/// boundary. What remains is infrastructure: ledger rejection or connection
/// loss, backup storage failure, and supervision defects.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("work queue closed")]
    QueueClosed,

    #[error("pipeline already started")]
    AlreadyStarted,

    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}
