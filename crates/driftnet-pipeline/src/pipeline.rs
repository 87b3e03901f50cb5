use std::sync::{Arc, Mutex};

use driftnet_backup::BackupStore;
use driftnet_ledger::{ChainParams, ConfirmationStream, LedgerError, LedgerGateway};
use driftnet_types::{Address, Fingerprint, Item};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dedup::DedupCache;
use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::pending::PendingTable;
use crate::supervisor::ShutdownSupervisor;

/// Cloneable handle through which discovery sources feed the pipeline.
///
/// Applies the dedup filter on enqueue; sends block when the bounded queue
/// is full, which is how backpressure reaches the producers.
#[derive(Clone)]
pub struct ItemSink {
    queue: mpsc::Sender<Item>,
    dedup: Arc<DedupCache>,
    metrics: Arc<PipelineMetrics>,
}

impl ItemSink {
    /// Enqueue a discovered item.
    ///
    /// Returns `Ok(false)` if the item was suppressed as recently seen.
    /// Blocks while the work queue is full.
    pub async fn enqueue(&self, item: Item) -> Result<bool, PipelineError> {
        let fingerprint = item.fingerprint();
        if self.dedup.seen(&fingerprint) {
            debug!(fingerprint = %fingerprint.short_hex(), "suppressing recently seen item");
            PipelineMetrics::incr(&self.metrics.deduplicated);
            return Ok(false);
        }
        self.dedup.mark(fingerprint);
        self.queue
            .send(item)
            .await
            .map_err(|_| PipelineError::QueueClosed)?;
        PipelineMetrics::incr(&self.metrics.enqueued);
        Ok(true)
    }
}

/// Outcome of the retried ownership lookup for one item.
enum OwnerLookup {
    Resolved(Option<Address>),
    Cancelled,
    GaveUp,
}

/// The content-submission pipeline.
///
/// Owns the bounded work queue, the pending table, and the dedup cache;
/// [`spawn`](SubmissionPipeline::spawn) registers the issuer and the
/// confirmation listener on a [`ShutdownSupervisor`]. Per-item state
/// machine: Discovered → Deduplicated → OwnershipChecked → BalancePending
/// → Submitted → Pending → Confirmed, with confirmation failures looping
/// the item back through the queue for re-submission.
pub struct SubmissionPipeline {
    config: PipelineConfig,
    gateway: Arc<dyn LedgerGateway>,
    backup: Option<Arc<dyn BackupStore>>,
    address: Address,
    pending: Arc<PendingTable>,
    dedup: Arc<DedupCache>,
    metrics: Arc<PipelineMetrics>,
    queue: mpsc::Sender<Item>,
    /// Taken by the issuer worker on spawn.
    queue_rx: Mutex<Option<mpsc::Receiver<Item>>>,
}

impl SubmissionPipeline {
    /// Create a pipeline submitting as `address` through `gateway`,
    /// optionally persisting unconfirmed items to `backup`.
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        backup: Option<Arc<dyn BackupStore>>,
        address: Address,
        config: PipelineConfig,
    ) -> Self {
        let (queue, queue_rx) = mpsc::channel(config.queue_capacity);
        Self {
            dedup: Arc::new(DedupCache::new(config.dedup_capacity)),
            pending: Arc::new(PendingTable::new()),
            metrics: Arc::new(PipelineMetrics::new()),
            config,
            gateway,
            backup,
            address,
            queue,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// A handle for discovery sources.
    pub fn sink(&self) -> ItemSink {
        ItemSink {
            queue: self.queue.clone(),
            dedup: self.dedup.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Pipeline counters.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Number of submitted-but-unconfirmed transactions.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Register the issuer and the confirmation listener on `supervisor`.
    ///
    /// Fails if the pipeline was already spawned or the gateway's
    /// confirmation stream is already consumed.
    pub fn spawn(
        self: &Arc<Self>,
        supervisor: &mut ShutdownSupervisor,
    ) -> Result<(), PipelineError> {
        // Check our own start state before consuming the gateway's
        // single-use stream, so a double spawn reports as such.
        let queue_rx = self
            .queue_rx
            .lock()
            .expect("queue receiver lock poisoned")
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;
        let stream = self.gateway.confirmations()?;

        let issuer = self.clone();
        supervisor.spawn("issuer", move |token| async move {
            issuer.issue_loop(queue_rx, token).await
        });

        let listener = self.clone();
        supervisor.spawn("confirmation-listener", move |token| async move {
            listener.listen_loop(stream, token).await
        });

        Ok(())
    }

    /// Re-drive entries surviving in the backup store through the queue.
    ///
    /// Call right after [`spawn`](SubmissionPipeline::spawn), before any
    /// discovery source starts, so replay takes priority over new work.
    /// Replayed duplicates of already registered content are absorbed by
    /// the issuer's ownership short-circuit. Returns the number of entries
    /// enqueued.
    pub async fn replay_backlog(&self) -> Result<usize, PipelineError> {
        let Some(backup) = &self.backup else {
            return Ok(0);
        };
        let entries = backup.replay()?;
        let count = entries.len();
        for entry in entries {
            debug!(fingerprint = %entry.key.short_hex(), "replaying backup entry");
            self.dedup.mark(entry.key);
            self.queue
                .send(entry.item)
                .await
                .map_err(|_| PipelineError::QueueClosed)?;
            PipelineMetrics::incr(&self.metrics.enqueued);
        }
        if count > 0 {
            info!(count, "replayed backup entries");
        }
        Ok(count)
    }

    /// Issuer worker: drains the work queue and walks each item through
    /// ownership check, backup, balance wait, and submission.
    async fn issue_loop(
        &self,
        mut queue_rx: mpsc::Receiver<Item>,
        token: CancellationToken,
    ) -> Result<(), PipelineError> {
        let params = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            params = self.gateway.chain_params() => params?,
        };
        debug!(state_lockup = params.state_lockup, "loaded chain parameters");

        loop {
            let item = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                item = queue_rx.recv() => match item {
                    Some(item) => item,
                    None => return Ok(()),
                },
            };
            self.issue_item(item, params, &token).await?;
            if token.is_cancelled() {
                return Ok(());
            }
        }
    }

    /// Process one dequeued item. Item-level failures are logged and
    /// absorbed here; only infrastructure errors propagate.
    async fn issue_item(
        &self,
        item: Item,
        params: ChainParams,
        token: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let fingerprint = item.fingerprint();

        // Ownership short-circuit, with bounded retries on transient
        // failure. The lookup is the authoritative duplicate check.
        let owner = match self.lookup_owner(&fingerprint, token).await? {
            OwnerLookup::Cancelled => return Ok(()),
            OwnerLookup::GaveUp => {
                warn!(
                    fingerprint = %fingerprint.short_hex(),
                    "dropping item: ownership lookup kept failing"
                );
                PipelineMetrics::incr(&self.metrics.dropped);
                // The drop is a network failure, not a verdict on the
                // content; a re-discovery must get through the sink.
                self.dedup.forget(&fingerprint);
                return Ok(());
            }
            OwnerLookup::Resolved(owner) => owner,
        };
        if let Some(owner) = owner {
            info!(
                fingerprint = %fingerprint.short_hex(),
                %owner,
                "already registered; dropping"
            );
            PipelineMetrics::incr(&self.metrics.already_owned);
            if let Some(backup) = &self.backup {
                backup.delete(fingerprint)?;
            }
            return Ok(());
        }

        let tx = match self.gateway.build_transaction(&item).await {
            Ok(tx) => tx,
            Err(LedgerError::Construction(reason)) => {
                warn!(
                    fingerprint = %fingerprint.short_hex(),
                    %reason,
                    "dropping malformed item"
                );
                PipelineMetrics::incr(&self.metrics.dropped);
                if let Some(backup) = &self.backup {
                    // A malformed item can never be registered; retire it
                    // so replay does not resurrect it forever.
                    backup.delete(fingerprint)?;
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // Durable before first submission: a crash from here on must not
        // lose the obligation to retry.
        if let Some(backup) = &self.backup {
            backup.put(fingerprint, &item)?;
        }

        // Backpressure: hold the issuer while the pending ceiling is
        // reached. Checked before insert, so the ceiling is never exceeded.
        while self.pending.len() >= self.config.max_pending {
            debug!(pending = self.pending.len(), "pending ceiling reached; waiting");
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.config.pending_poll) => {}
            }
        }

        // Track before the balance wait so a crash while waiting is
        // recoverable; a second in-flight record for the same fingerprint
        // means the dedup cache evicted it while a copy was still pending.
        if !self.pending.insert(tx.id, item) {
            debug!(
                fingerprint = %fingerprint.short_hex(),
                "duplicate already in flight; dropping"
            );
            PipelineMetrics::incr(&self.metrics.deduplicated);
            return Ok(());
        }

        let required = tx.fee + params.state_lockup;
        let funded = tokio::select! {
            _ = token.cancelled() => {
                // Abort the item without side effects.
                self.pending.remove(&tx.id);
                return Ok(());
            }
            funded = self.gateway.await_balance(&self.address, required) => funded,
        };
        if let Err(e) = funded {
            self.pending.remove(&tx.id);
            return Err(e.into());
        }

        if let Err(e) = self.gateway.submit(&tx).await {
            warn!(tx_id = %tx.id.short_hex(), error = %e, "transaction submission failed");
            self.pending.remove(&tx.id);
            return Err(e.into());
        }
        info!(
            tx_id = %tx.id.short_hex(),
            fingerprint = %fingerprint.short_hex(),
            fee = tx.fee,
            "submitted transaction"
        );
        PipelineMetrics::incr(&self.metrics.submitted);
        Ok(())
    }

    async fn lookup_owner(
        &self,
        fingerprint: &Fingerprint,
        token: &CancellationToken,
    ) -> Result<OwnerLookup, PipelineError> {
        for attempt in 1..=self.config.owner_retry_attempts {
            match self.gateway.owner_of(fingerprint).await {
                Ok(owner) => return Ok(OwnerLookup::Resolved(owner)),
                Err(e) if e.is_retryable() => {
                    warn!(
                        fingerprint = %fingerprint.short_hex(),
                        attempt,
                        error = %e,
                        "ownership lookup failed"
                    );
                    tokio::select! {
                        _ = token.cancelled() => return Ok(OwnerLookup::Cancelled),
                        _ = tokio::time::sleep(self.config.owner_retry_backoff) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(OwnerLookup::GaveUp)
    }

    /// Confirmation listener: the single consumer of the ledger's event
    /// stream. Serializes all pending-table resolutions in arrival order.
    async fn listen_loop(
        &self,
        mut stream: ConfirmationStream,
        token: CancellationToken,
    ) -> Result<(), PipelineError> {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                event = stream.recv() => match event {
                    Some(event) => event,
                    None if token.is_cancelled() => return Ok(()),
                    None => {
                        return Err(LedgerError::Connection(
                            "confirmation stream closed".into(),
                        )
                        .into());
                    }
                },
            };

            let Some(record) = self.pending.remove(&event.tx_id) else {
                debug!(tx_id = %event.tx_id.short_hex(), "confirmation for unknown transaction");
                continue;
            };

            if event.success {
                info!(tx_id = %event.tx_id.short_hex(), "transaction confirmed");
                PipelineMetrics::incr(&self.metrics.confirmed);
                if let Some(backup) = &self.backup {
                    backup.delete(record.item.fingerprint())?;
                }
            } else {
                warn!(
                    tx_id = %event.tx_id.short_hex(),
                    error = event.error.as_deref().unwrap_or("unconfirmed"),
                    "transaction failed; requeueing"
                );
                PipelineMetrics::incr(&self.metrics.retried);
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    sent = self.queue.send(record.item) => {
                        sent.map_err(|_| PipelineError::QueueClosed)?;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use driftnet_backup::{BackupStore, FileBackupStore, InMemoryBackupStore, SyncMode};
    use driftnet_ledger::MockLedger;
    use driftnet_types::SchemaId;

    use super::*;

    const ADDR: Address = Address::from_bytes([1u8; 32]);

    fn item(payload: &[u8]) -> Item {
        Item::new(SchemaId::derive("pipeline-test"), payload.to_vec())
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            queue_capacity: 64,
            max_pending: 8,
            pending_poll: Duration::from_millis(10),
            dedup_capacity: 1024,
            owner_retry_attempts: 3,
            owner_retry_backoff: Duration::from_millis(10),
            drain_timeout: Duration::from_secs(1),
        }
    }

    fn start(
        ledger: &Arc<MockLedger>,
        backup: Option<Arc<dyn BackupStore>>,
        config: PipelineConfig,
    ) -> (Arc<SubmissionPipeline>, ShutdownSupervisor) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let pipeline = Arc::new(SubmissionPipeline::new(
            ledger.clone(),
            backup,
            ADDR,
            config.clone(),
        ));
        let mut supervisor = ShutdownSupervisor::new(config.drain_timeout);
        pipeline.spawn(&mut supervisor).unwrap();
        (pipeline, supervisor)
    }

    async fn wait_until(what: &str, f: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !f() {
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {what}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn single_item_submits_tracks_and_confirms() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let backup = Arc::new(InMemoryBackupStore::new());
        let (pipeline, supervisor) =
            start(&ledger, Some(backup.clone()), test_config());

        let it = Item::new(SchemaId::derive("abc-schema"), b"hello".to_vec());
        assert!(pipeline.sink().enqueue(it.clone()).await.unwrap());

        wait_until("submission", || ledger.submitted_count() == 1).await;
        let tx = ledger.submitted()[0].clone();
        assert_eq!(tx.item, it);
        assert_eq!(pipeline.pending_len(), 1);
        assert_eq!(backup.len().unwrap(), 1);

        ledger.confirm_success(tx.id);
        wait_until("confirmation", || pipeline.pending_len() == 0).await;
        wait_until("backup retirement", || backup.is_empty().unwrap()).await;
        assert_eq!(pipeline.metrics().snapshot().confirmed, 1);

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn already_owned_fingerprint_is_never_submitted() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let it = item(b"claimed elsewhere");
        ledger.set_owner(it.fingerprint(), Address::from_bytes([9u8; 32]));
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        pipeline.sink().enqueue(it).await.unwrap();
        wait_until("ownership drop", || {
            pipeline.metrics().snapshot().already_owned == 1
        })
        .await;
        assert_eq!(ledger.submitted_count(), 0);

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_discoveries_yield_one_submission() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        // Two discovery sources observing the same content.
        let source_a = pipeline.sink();
        let source_b = pipeline.sink();
        let it = item(b"seen twice");
        assert!(source_a.enqueue(it.clone()).await.unwrap());
        assert!(!source_b.enqueue(it).await.unwrap());

        wait_until("submission", || ledger.submitted_count() == 1).await;
        let snap = pipeline.metrics().snapshot();
        assert_eq!(snap.deduplicated, 1);
        assert_eq!(ledger.submitted_count(), 1);

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn backpressure_holds_at_pending_ceiling() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 10_000_000);
        let config = PipelineConfig {
            max_pending: 4,
            ..test_config()
        };
        let (pipeline, supervisor) = start(&ledger, None, config);

        let sink = pipeline.sink();
        for i in 0u8..10 {
            sink.enqueue(item(&[i])).await.unwrap();
        }

        // With no confirmations the issuer must stall at the ceiling.
        wait_until("ceiling", || ledger.submitted_count() == 4).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ledger.submitted_count(), 4);
        assert_eq!(pipeline.pending_len(), 4);

        // Confirmations free capacity; throughput resumes.
        for tx in ledger.submitted().iter().take(2) {
            ledger.confirm_success(tx.id);
        }
        wait_until("resume", || ledger.submitted_count() == 6).await;
        assert!(pipeline.pending_len() <= 4);

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn failed_confirmation_requeues_same_item() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        pipeline.sink().enqueue(item(b"flaky")).await.unwrap();
        wait_until("first submission", || ledger.submitted_count() == 1).await;

        let first = ledger.submitted()[0].clone();
        ledger.confirm_failure(first.id, "reverted");
        wait_until("re-submission", || ledger.submitted_count() == 2).await;

        let second = ledger.submitted()[1].clone();
        assert_eq!(second.item, first.item);
        assert_eq!(second.item.fingerprint(), first.item.fingerprint());
        assert_eq!(pipeline.metrics().snapshot().retried, 1);

        ledger.confirm_success(second.id);
        wait_until("final confirmation", || pipeline.pending_len() == 0).await;

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn submission_rejection_aborts_pipeline() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        ledger.reject_next_submission();
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        pipeline.sink().enqueue(item(b"doomed")).await.unwrap();

        let err = supervisor.join().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Ledger(LedgerError::Submission(_))
        ));
        // The aborted submission left no pending record behind.
        assert_eq!(pipeline.pending_len(), 0);
    }

    #[tokio::test]
    async fn transient_lookup_failures_drop_item_not_pipeline() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        // Exhaust every retry attempt for the first item.
        ledger.fail_owner_lookups(test_config().owner_retry_attempts);
        pipeline.sink().enqueue(item(b"unlucky")).await.unwrap();
        wait_until("drop", || pipeline.metrics().snapshot().dropped == 1).await;
        assert_eq!(ledger.submitted_count(), 0);

        // The pipeline itself is still alive.
        pipeline.sink().enqueue(item(b"lucky")).await.unwrap();
        wait_until("next submission", || ledger.submitted_count() == 1).await;

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn rediscovery_after_transient_drop_is_accepted() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        ledger.fail_owner_lookups(test_config().owner_retry_attempts);
        let it = item(b"blipped");
        pipeline.sink().enqueue(it.clone()).await.unwrap();
        wait_until("drop", || pipeline.metrics().snapshot().dropped == 1).await;
        assert_eq!(ledger.submitted_count(), 0);

        // The network recovered and the discovery source observes the
        // same content again: it must not be suppressed as a duplicate.
        assert!(pipeline.sink().enqueue(it).await.unwrap());
        wait_until("submission", || ledger.submitted_count() == 1).await;

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn oversized_item_is_dropped_and_logged() {
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        let oversized = item(&vec![0u8; driftnet_types::MAX_PAYLOAD_SIZE + 1]);
        pipeline.sink().enqueue(oversized).await.unwrap();
        wait_until("drop", || pipeline.metrics().snapshot().dropped == 1).await;
        assert_eq!(ledger.submitted_count(), 0);

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn stream_close_is_fatal_when_not_cancelled() {
        let ledger = Arc::new(MockLedger::new());
        let (_pipeline, supervisor) = start(&ledger, None, test_config());

        ledger.close_confirmations();
        let err = supervisor.join().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Ledger(LedgerError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn cancellation_during_balance_wait_leaves_no_partial_state() {
        // No credit: the issuer will park in the balance wait with a
        // pending record already inserted.
        let ledger = Arc::new(MockLedger::new());
        let (pipeline, supervisor) = start(&ledger, None, test_config());

        pipeline.sink().enqueue(item(b"unfunded")).await.unwrap();
        wait_until("balance wait", || pipeline.pending_len() == 1).await;
        assert_eq!(ledger.submitted_count(), 0);

        supervisor.cancel();
        supervisor.join().await.unwrap();
        assert_eq!(pipeline.pending_len(), 0);
        assert_eq!(ledger.submitted_count(), 0);
    }

    #[tokio::test]
    async fn crash_recovery_replays_unconfirmed_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.log");
        let it = item(b"survives the crash");

        // First run: submit but never observe a confirmation.
        {
            let ledger = Arc::new(MockLedger::new());
            ledger.credit(ADDR, 1_000_000);
            let backup: Arc<dyn BackupStore> =
                Arc::new(FileBackupStore::open(&path, SyncMode::OsDefault).unwrap());
            let (pipeline, supervisor) = start(&ledger, Some(backup), test_config());

            pipeline.sink().enqueue(it.clone()).await.unwrap();
            wait_until("submission", || ledger.submitted_count() == 1).await;

            // Simulated crash: shut down without confirming.
            supervisor.cancel();
            supervisor.join().await.unwrap();
        }

        // Restart: replay drives the item through again, exactly once.
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        let store = Arc::new(FileBackupStore::open(&path, SyncMode::OsDefault).unwrap());
        assert_eq!(store.len().unwrap(), 1);
        let (pipeline, supervisor) =
            start(&ledger, Some(store.clone() as Arc<dyn BackupStore>), test_config());

        assert_eq!(pipeline.replay_backlog().await.unwrap(), 1);
        wait_until("replayed submission", || ledger.submitted_count() == 1).await;
        assert_eq!(
            ledger.submitted()[0].item.fingerprint(),
            it.fingerprint()
        );

        ledger.confirm_success(ledger.submitted()[0].id);
        wait_until("retirement", || store.is_empty().unwrap()).await;
        assert_eq!(ledger.submitted_count(), 1);

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn replayed_entry_already_registered_is_retired_without_submission() {
        let it = item(b"registered before the crash");
        let store = Arc::new(InMemoryBackupStore::new());
        store.put(it.fingerprint(), &it).unwrap();

        // The ledger already owns the fingerprint: the confirmation landed
        // but the crash beat the backup retirement.
        let ledger = Arc::new(MockLedger::new());
        ledger.credit(ADDR, 1_000_000);
        ledger.set_owner(it.fingerprint(), Address::from_bytes([9u8; 32]));
        let (pipeline, supervisor) =
            start(&ledger, Some(store.clone() as Arc<dyn BackupStore>), test_config());

        assert_eq!(pipeline.replay_backlog().await.unwrap(), 1);
        wait_until("retirement", || store.is_empty().unwrap()).await;
        assert_eq!(ledger.submitted_count(), 0);
        assert_eq!(pipeline.metrics().snapshot().already_owned, 1);

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }

    #[tokio::test]
    async fn spawn_twice_fails() {
        let ledger = Arc::new(MockLedger::new());
        let pipeline = Arc::new(SubmissionPipeline::new(
            ledger,
            None,
            ADDR,
            test_config(),
        ));
        let mut supervisor = ShutdownSupervisor::new(Duration::from_secs(1));
        pipeline.spawn(&mut supervisor).unwrap();
        assert!(matches!(
            pipeline.spawn(&mut supervisor),
            Err(PipelineError::AlreadyStarted)
        ));

        supervisor.cancel();
        supervisor.join().await.unwrap();
    }
}
