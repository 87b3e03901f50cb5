use driftnet_types::{Fingerprint, Item};

use crate::error::BackupResult;

/// A live backup entry: an item that was recorded for submission and has
/// not yet been retired by a confirmed registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupEntry {
    /// The item's content fingerprint (the storage key).
    pub key: Fingerprint,
    /// The recorded item.
    pub item: Item,
}

/// Durable record of submitted-but-unconfirmed items.
///
/// All implementations must satisfy these invariants:
/// - `put` is durable before it returns: a crash immediately after a
///   successful `put` must not lose the entry.
/// - Entries are keyed by content fingerprint. Re-`put` of an existing key
///   overwrites the value but keeps the original insertion position.
/// - `replay` yields live entries (puts not yet deleted) in first-insertion
///   order, and is restartable by re-invoking.
/// - All I/O errors are propagated, never silently ignored.
pub trait BackupStore: Send + Sync {
    /// Durably record an item under its fingerprint.
    fn put(&self, key: Fingerprint, item: &Item) -> BackupResult<()>;

    /// Retire an entry. Returns `true` if the entry existed.
    fn delete(&self, key: Fingerprint) -> BackupResult<bool>;

    /// All live entries in first-insertion order.
    fn replay(&self) -> BackupResult<Vec<BackupEntry>>;

    /// Number of live entries.
    fn len(&self) -> BackupResult<usize> {
        Ok(self.replay()?.len())
    }

    /// Returns `true` if there are no live entries.
    fn is_empty(&self) -> BackupResult<bool> {
        Ok(self.len()? == 0)
    }
}
