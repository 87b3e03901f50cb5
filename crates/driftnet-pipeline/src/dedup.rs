use std::num::NonZeroUsize;
use std::sync::Mutex;

use driftnet_types::Fingerprint;
use lru::LruCache;

/// Bounded set of recently seen content fingerprints.
///
/// Suppresses redundant ledger work for content a discovery source emits
/// again across polling cycles. This is a performance optimization, not a
/// correctness mechanism: the authoritative duplicate check is the ledger
/// ownership lookup, so eviction under pressure costs at most a redundant
/// lookup, never a duplicate registration.
///
/// The lock is held only for a single cache operation.
pub struct DedupCache {
    inner: Mutex<LruCache<Fingerprint, ()>>,
}

impl DedupCache {
    /// Create a cache remembering at most `capacity` fingerprints, with
    /// least-recently-used eviction.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("dedup capacity must be non-zero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns `true` if the fingerprint was seen recently. Refreshes its
    /// recency.
    pub fn seen(&self, fingerprint: &Fingerprint) -> bool {
        self.inner
            .lock()
            .expect("dedup lock poisoned")
            .get(fingerprint)
            .is_some()
    }

    /// Record a fingerprint as seen.
    pub fn mark(&self, fingerprint: Fingerprint) {
        self.inner
            .lock()
            .expect("dedup lock poisoned")
            .put(fingerprint, ());
    }

    /// Remove a fingerprint, so a re-discovery of the content is accepted
    /// again. Used when an item is dropped for a reason that says nothing
    /// about the content itself.
    pub fn forget(&self, fingerprint: &Fingerprint) {
        self.inner
            .lock()
            .expect("dedup lock poisoned")
            .pop(fingerprint);
    }

    /// Number of fingerprints currently remembered.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("dedup lock poisoned").len()
    }

    /// Returns `true` if nothing has been marked yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
