use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters.
///
/// Retries driven by confirmation failures are unlimited, so `retried` is
/// the observable that makes a runaway retry loop detectable from outside.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Items accepted into the work queue.
    pub enqueued: AtomicU64,
    /// Items suppressed by the dedup cache or an in-flight duplicate.
    pub deduplicated: AtomicU64,
    /// Items dropped because the ledger already has an owner for them.
    pub already_owned: AtomicU64,
    /// Transactions submitted to the ledger (including re-submissions).
    pub submitted: AtomicU64,
    /// Transactions confirmed successful.
    pub confirmed: AtomicU64,
    /// Items requeued after a confirmation failure.
    pub retried: AtomicU64,
    /// Items dropped as unprocessable (malformed, or lookups kept failing).
    pub dropped: AtomicU64,
}

/// Point-in-time copy of all counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub deduplicated: u64,
    pub already_owned: u64,
    pub submitted: u64,
    pub confirmed: u64,
    pub retried: u64,
    pub dropped: u64,
}

impl PipelineMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            already_owned: self.already_owned.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = PipelineMetrics::new();
        PipelineMetrics::incr(&metrics.submitted);
        PipelineMetrics::incr(&metrics.submitted);
        PipelineMetrics::incr(&metrics.retried);

        let snap = metrics.snapshot();
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.retried, 1);
        assert_eq!(snap.confirmed, 0);
    }
}
