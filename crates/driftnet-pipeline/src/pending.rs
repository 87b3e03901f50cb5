use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use driftnet_types::{Fingerprint, Item, TxId};

/// Metadata for one in-flight submission.
#[derive(Clone, Debug)]
pub struct SubmissionRecord {
    /// The transaction the item was submitted under.
    pub tx_id: TxId,
    /// The originating item, needed for requeue on failure.
    pub item: Item,
    /// When the record was created (just before the balance wait).
    pub submitted_at: DateTime<Utc>,
}

#[derive(Default)]
struct PendingInner {
    by_tx: HashMap<TxId, SubmissionRecord>,
    /// Fingerprints with a live record, for the at-most-one-in-flight check.
    in_flight: HashSet<Fingerprint>,
}

/// Tracks submitted-but-unconfirmed transactions.
///
/// Guards the invariant that a fingerprint has at most one live record at a
/// time: a second insert for the same fingerprint is rejected. All
/// mutations go through the single confirmation listener or the single
/// issuer, and the lock is held only per read-modify-write, never across a
/// suspension point.
pub struct PendingTable {
    inner: Mutex<PendingInner>,
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PendingInner::default()),
        }
    }

    /// Track a new in-flight submission.
    ///
    /// Returns `false` (without inserting) if the item's fingerprint
    /// already has a live record.
    pub fn insert(&self, tx_id: TxId, item: Item) -> bool {
        let fingerprint = item.fingerprint();
        let mut inner = self.inner.lock().expect("pending lock poisoned");
        if !inner.in_flight.insert(fingerprint) {
            return false;
        }
        inner.by_tx.insert(
            tx_id,
            SubmissionRecord {
                tx_id,
                item,
                submitted_at: Utc::now(),
            },
        );
        true
    }

    /// Resolve a transaction, removing and returning its record.
    pub fn remove(&self, tx_id: &TxId) -> Option<SubmissionRecord> {
        let mut inner = self.inner.lock().expect("pending lock poisoned");
        let record = inner.by_tx.remove(tx_id)?;
        inner.in_flight.remove(&record.item.fingerprint());
        Some(record)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("pending lock poisoned").by_tx.len()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a fingerprint has a live record.
    pub fn in_flight(&self, fingerprint: &Fingerprint) -> bool {
        self.inner
            .lock()
            .expect("pending lock poisoned")
            .in_flight
            .contains(fingerprint)
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftnet_types::SchemaId;

    fn item(payload: &[u8]) -> Item {
        Item::new(SchemaId::derive("pending-test"), payload.to_vec())
    }

    fn tx(byte: u8) -> TxId {
        TxId::from_bytes([byte; 32])
    }

    #[test]
    fn insert_and_remove() {
        let table = PendingTable::new();
        let it = item(b"one");

        assert!(table.insert(tx(1), it.clone()));
        assert_eq!(table.len(), 1);
        assert!(table.in_flight(&it.fingerprint()));

        let record = table.remove(&tx(1)).unwrap();
        assert_eq!(record.item, it);
        assert!(table.is_empty());
        assert!(!table.in_flight(&it.fingerprint()));
    }

    #[test]
    fn rejects_second_record_for_same_fingerprint() {
        let table = PendingTable::new();
        let it = item(b"dup");

        assert!(table.insert(tx(1), it.clone()));
        assert!(!table.insert(tx(2), it.clone()));
        assert_eq!(table.len(), 1);

        // After resolution the fingerprint may fly again.
        table.remove(&tx(1)).unwrap();
        assert!(table.insert(tx(2), it));
    }

    #[test]
    fn remove_unknown_tx_is_none() {
        let table = PendingTable::new();
        assert!(table.remove(&tx(9)).is_none());
    }
}
