use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the submission pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the bounded work queue between discovery and the issuer.
    pub queue_capacity: usize,
    /// Ceiling on outstanding (submitted, unconfirmed) transactions. The
    /// issuer blocks, never drops, when this is reached.
    pub max_pending: usize,
    /// How often the issuer re-checks the pending ceiling while blocked.
    pub pending_poll: Duration,
    /// Capacity of the dedup cache (fingerprints remembered across
    /// discovery polling cycles).
    pub dedup_capacity: usize,
    /// Attempts for a transiently failing ownership lookup before the item
    /// is dropped.
    pub owner_retry_attempts: u32,
    /// Backoff between ownership lookup attempts.
    pub owner_retry_backoff: Duration,
    /// How long shutdown waits for workers to drain before aborting them.
    pub drain_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_pending: 256,
            pending_poll: Duration::from_secs(1),
            dedup_capacity: 20_000,
            owner_retry_attempts: 3,
            owner_retry_backoff: Duration::from_millis(500),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = PipelineConfig::default();
        assert_eq!(c.queue_capacity, 1024);
        assert_eq!(c.max_pending, 256);
        assert_eq!(c.dedup_capacity, 20_000);
        assert!(c.owner_retry_attempts > 0);
    }

    #[test]
    fn serde_roundtrip() {
        let c = PipelineConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_pending, c.max_pending);
        assert_eq!(back.pending_poll, c.pending_poll);
    }
}
