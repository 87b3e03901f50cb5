use std::collections::HashMap;
use std::sync::RwLock;

use driftnet_types::{Fingerprint, Item};

use crate::error::BackupResult;
use crate::traits::{BackupEntry, BackupStore};

/// In-memory backup store.
///
/// Intended for tests and embedding. Preserves first-insertion order for
/// replay by keeping keys in an ordered list alongside the map.
pub struct InMemoryBackupStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    items: HashMap<Fingerprint, Item>,
    /// Insertion order; may contain keys later deleted from `items`.
    order: Vec<Fingerprint>,
}

impl InMemoryBackupStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryBackupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupStore for InMemoryBackupStore {
    fn put(&self, key: Fingerprint, item: &Item) -> BackupResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if inner.items.insert(key, item.clone()).is_none() {
            inner.order.push(key);
        }
        Ok(())
    }

    fn delete(&self, key: Fingerprint) -> BackupResult<bool> {
        let mut inner = self.inner.write().expect("lock poisoned");
        Ok(inner.items.remove(&key).is_some())
    }

    fn replay(&self) -> BackupResult<Vec<BackupEntry>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .order
            .iter()
            .filter_map(|key| {
                inner.items.get(key).map(|item| BackupEntry {
                    key: *key,
                    item: item.clone(),
                })
            })
            .collect())
    }

    fn len(&self) -> BackupResult<usize> {
        Ok(self.inner.read().expect("lock poisoned").items.len())
    }
}
