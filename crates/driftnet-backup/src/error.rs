use std::io;

/// Errors produced by backup store operations.
///
/// Backup failures are fatal to the pipeline: if the store cannot be
/// written, crash-recovery correctness can no longer be guaranteed.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("backup serialization error: {0}")]
    Serialization(String),
}

/// Result alias for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;
