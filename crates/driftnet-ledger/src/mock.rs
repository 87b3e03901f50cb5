use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use driftnet_types::{Address, ConfirmationEvent, Fingerprint, Item, TxId};
use tokio::sync::{mpsc, Notify};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::gateway::{ChainParams, ConfirmationStream, LedgerGateway, PreparedTransaction};

/// Base fee charged per transaction by the mock fee model.
pub const MOCK_BASE_FEE: u64 = 100;

/// Owner recorded for fingerprints registered through the mock.
const MOCK_OWNER: Address = Address::from_bytes([0xEE; 32]);

#[derive(Default)]
struct MockState {
    owners: HashMap<Fingerprint, Address>,
    balances: HashMap<Address, u64>,
    submitted: Vec<PreparedTransaction>,
    /// Remaining `owner_of` calls that should fail with `Transient`.
    owner_failures: u32,
    /// Next `submit` call fails with `Submission` if set.
    reject_next_submission: bool,
}

/// In-memory ledger gateway for tests and embedding.
///
/// Confirmations are under manual control: nothing confirms until the test
/// calls [`confirm_success`](MockLedger::confirm_success) or
/// [`confirm_failure`](MockLedger::confirm_failure), which makes stalls and
/// retries reproducible. Transient and submission failures can be injected.
pub struct MockLedger {
    state: Mutex<MockState>,
    balance_changed: Notify,
    confirm_tx: Mutex<Option<mpsc::UnboundedSender<ConfirmationEvent>>>,
    confirm_rx: Mutex<Option<ConfirmationStream>>,
    params: ChainParams,
}

impl MockLedger {
    /// Create a mock ledger with no lockup requirement.
    pub fn new() -> Self {
        Self::with_params(ChainParams { state_lockup: 0 })
    }

    /// Create a mock ledger with explicit chain parameters.
    pub fn with_params(params: ChainParams) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(MockState::default()),
            balance_changed: Notify::new(),
            confirm_tx: Mutex::new(Some(tx)),
            confirm_rx: Mutex::new(Some(rx)),
            params,
        }
    }

    /// Pre-register a fingerprint as owned.
    pub fn set_owner(&self, fingerprint: Fingerprint, owner: Address) {
        self.state
            .lock()
            .expect("mock state lock poisoned")
            .owners
            .insert(fingerprint, owner);
    }

    /// Add to an address's balance and wake any balance waiters.
    pub fn credit(&self, address: Address, amount: u64) {
        {
            let mut state = self.state.lock().expect("mock state lock poisoned");
            *state.balances.entry(address).or_insert(0) += amount;
        }
        self.balance_changed.notify_waiters();
    }

    /// Make the next `n` ownership lookups fail with a transient error.
    pub fn fail_owner_lookups(&self, n: u32) {
        self.state
            .lock()
            .expect("mock state lock poisoned")
            .owner_failures = n;
    }

    /// Make the next submission fail with a `Submission` error.
    pub fn reject_next_submission(&self) {
        self.state
            .lock()
            .expect("mock state lock poisoned")
            .reject_next_submission = true;
    }

    /// Transactions submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<PreparedTransaction> {
        self.state
            .lock()
            .expect("mock state lock poisoned")
            .submitted
            .clone()
    }

    /// Number of transactions submitted so far.
    pub fn submitted_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock state lock poisoned")
            .submitted
            .len()
    }

    /// Confirm a submitted transaction as successful. Registers ownership
    /// of the item's fingerprint, as the real ledger would.
    pub fn confirm_success(&self, tx_id: TxId) {
        let fingerprint = {
            let mut state = self.state.lock().expect("mock state lock poisoned");
            let fp = state
                .submitted
                .iter()
                .find(|tx| tx.id == tx_id)
                .map(|tx| tx.item.fingerprint());
            if let Some(fp) = fp {
                state.owners.insert(fp, MOCK_OWNER);
            }
            fp
        };
        debug!(%tx_id, registered = fingerprint.is_some(), "mock confirm success");
        self.send_event(ConfirmationEvent::success(tx_id));
    }

    /// Report a submitted transaction as failed (or rolled back).
    pub fn confirm_failure(&self, tx_id: TxId, reason: &str) {
        self.send_event(ConfirmationEvent::failure(tx_id, reason));
    }

    /// Close the confirmation stream, as a lost ledger connection would.
    pub fn close_confirmations(&self) {
        self.confirm_tx
            .lock()
            .expect("mock sender lock poisoned")
            .take();
    }

    fn send_event(&self, event: ConfirmationEvent) {
        if let Some(tx) = self
            .confirm_tx
            .lock()
            .expect("mock sender lock poisoned")
            .as_ref()
        {
            // The receiver may already be dropped during shutdown.
            let _ = tx.send(event);
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn owner_of(&self, fingerprint: &Fingerprint) -> LedgerResult<Option<Address>> {
        let mut state = self.state.lock().expect("mock state lock poisoned");
        if state.owner_failures > 0 {
            state.owner_failures -= 1;
            return Err(LedgerError::Transient("injected network failure".into()));
        }
        Ok(state.owners.get(fingerprint).copied())
    }

    async fn balance_of(&self, address: &Address) -> LedgerResult<u64> {
        let state = self.state.lock().expect("mock state lock poisoned");
        Ok(state.balances.get(address).copied().unwrap_or(0))
    }

    async fn await_balance(&self, address: &Address, minimum: u64) -> LedgerResult<()> {
        loop {
            // Register for the wakeup before checking, so a concurrent
            // credit between check and await is not missed.
            let notified = self.balance_changed.notified();
            if self.balance_of(address).await? >= minimum {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn chain_params(&self) -> LedgerResult<ChainParams> {
        Ok(self.params)
    }

    async fn build_transaction(&self, item: &Item) -> LedgerResult<PreparedTransaction> {
        item.check_payload_size()
            .map_err(|e| LedgerError::Construction(e.to_string()))?;
        Ok(PreparedTransaction {
            id: TxId::from_bytes(rand::random()),
            item: item.clone(),
            fee: MOCK_BASE_FEE + item.payload.len() as u64,
        })
    }

    async fn submit(&self, tx: &PreparedTransaction) -> LedgerResult<TxId> {
        let mut state = self.state.lock().expect("mock state lock poisoned");
        if state.reject_next_submission {
            state.reject_next_submission = false;
            return Err(LedgerError::Submission("injected rejection".into()));
        }
        state.submitted.push(tx.clone());
        Ok(tx.id)
    }

    fn confirmations(&self) -> LedgerResult<ConfirmationStream> {
        self.confirm_rx
            .lock()
            .expect("mock stream lock poisoned")
            .take()
            .ok_or(LedgerError::StreamConsumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftnet_types::{SchemaId, MAX_PAYLOAD_SIZE};

    fn item(payload: &[u8]) -> Item {
        Item::new(SchemaId::derive("mock-test"), payload.to_vec())
    }

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn unclaimed_fingerprint_has_no_owner() {
        let ledger = MockLedger::new();
        assert_eq!(ledger.owner_of(&item(b"x").fingerprint()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn injected_owner_failures_are_transient_and_bounded() {
        let ledger = MockLedger::new();
        let fp = item(b"x").fingerprint();
        ledger.fail_owner_lookups(2);

        for _ in 0..2 {
            let err = ledger.owner_of(&fp).await.unwrap_err();
            assert!(err.is_retryable());
        }
        assert!(ledger.owner_of(&fp).await.is_ok());
    }

    #[tokio::test]
    async fn await_balance_wakes_on_credit() {
        let ledger = std::sync::Arc::new(MockLedger::new());
        let a = addr(1);

        let waiter = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.await_balance(&a, 500).await })
        };
        tokio::task::yield_now().await;

        ledger.credit(a, 250);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        ledger.credit(a, 250);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_item_fails_construction() {
        let ledger = MockLedger::new();
        let err = ledger
            .build_transaction(&item(&vec![0u8; MAX_PAYLOAD_SIZE + 1]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Construction(_)));
    }

    #[tokio::test]
    async fn confirm_success_registers_ownership() {
        let ledger = MockLedger::new();
        let it = item(b"register me");
        let tx = ledger.build_transaction(&it).await.unwrap();
        ledger.submit(&tx).await.unwrap();

        assert_eq!(ledger.owner_of(&it.fingerprint()).await.unwrap(), None);
        ledger.confirm_success(tx.id);
        assert!(ledger.owner_of(&it.fingerprint()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn confirmation_stream_is_single_consumer() {
        let ledger = MockLedger::new();
        assert!(ledger.confirmations().is_ok());
        assert!(matches!(
            ledger.confirmations(),
            Err(LedgerError::StreamConsumed)
        ));
    }

    #[tokio::test]
    async fn closing_stream_ends_receiver() {
        let ledger = MockLedger::new();
        let mut stream = ledger.confirmations().unwrap();
        ledger.close_confirmations();
        assert!(stream.recv().await.is_none());
    }
}
