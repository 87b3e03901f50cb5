//! Durable backup store for driftnet.
//!
//! Every item is durably recorded here *before* it is first submitted to
//! the ledger, so a crash between submission and confirmation never loses
//! the obligation to retry. On restart, [`BackupStore::replay`] re-drives
//! the surviving entries through the pipeline ahead of new discovery work.
//!
//! Two implementations:
//! - [`InMemoryBackupStore`] for tests and embedding
//! - [`FileBackupStore`], a crash-recoverable append-only log

pub mod error;
pub mod log;
pub mod memory;
pub mod traits;

pub use error::{BackupError, BackupResult};
pub use log::{FileBackupStore, SyncMode};
pub use memory::InMemoryBackupStore;
pub use traits::{BackupEntry, BackupStore};
