use async_trait::async_trait;
use driftnet_types::{Address, ConfirmationEvent, Fingerprint, Item, TxId};
use tokio::sync::mpsc;

use crate::error::LedgerResult;

/// Fee-relevant chain parameters, loaded once at pipeline start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainParams {
    /// Balance that must remain locked per registered entry, on top of the
    /// transaction fee.
    pub state_lockup: u64,
}

/// A transaction constructed from an item, ready for submission.
///
/// The id is assigned at construction time, which lets the pipeline track
/// the submission before the ledger acknowledges it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedTransaction {
    /// Identifier the ledger will know this transaction by.
    pub id: TxId,
    /// The originating item.
    pub item: Item,
    /// Fee required to submit this transaction.
    pub fee: u64,
}

/// Ordered, single-consumer stream of confirmation events.
///
/// Unbounded: the ledger decides the pace. Closing the sender side (for
/// example on shutdown) terminates the listener cleanly.
pub type ConfirmationStream = mpsc::UnboundedReceiver<ConfirmationEvent>;

/// Narrow client contract against the external ledger.
///
/// Two logical sub-connections back this trait in a real deployment: a
/// query channel (ownership, balance, chain parameters) and a streaming
/// decision channel (submission plus confirmations). See
/// [`Endpoint`](crate::Endpoint) for how both are derived from a single
/// configuration string.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Who currently owns a fingerprint, or `None` if it is unclaimed.
    ///
    /// Fails with [`LedgerError::Transient`](crate::LedgerError::Transient)
    /// on network failure; callers retry at the call site.
    async fn owner_of(&self, fingerprint: &Fingerprint) -> LedgerResult<Option<Address>>;

    /// Current spendable balance of an identity.
    async fn balance_of(&self, address: &Address) -> LedgerResult<u64>;

    /// Suspend until `address` holds at least `minimum`.
    ///
    /// Callers race this against their cancellation signal; the method
    /// itself never times out.
    async fn await_balance(&self, address: &Address, minimum: u64) -> LedgerResult<()>;

    /// Chain parameters relevant to fee computation.
    async fn chain_params(&self) -> LedgerResult<ChainParams>;

    /// Deterministically construct a transaction for an item.
    ///
    /// Fails with [`LedgerError::Construction`](crate::LedgerError::Construction)
    /// on a malformed item (for example an oversized payload); such items
    /// are dropped, never retried.
    async fn build_transaction(&self, item: &Item) -> LedgerResult<PreparedTransaction>;

    /// Submit a constructed transaction. Returns the transaction id the
    /// ledger accepted it under.
    ///
    /// Fails with [`LedgerError::Submission`](crate::LedgerError::Submission)
    /// on outright rejection, which is fatal to the pipeline.
    async fn submit(&self, tx: &PreparedTransaction) -> LedgerResult<TxId>;

    /// Take the confirmation stream.
    ///
    /// Single consumer: the first call returns the stream, later calls fail
    /// with [`LedgerError::StreamConsumed`](crate::LedgerError::StreamConsumed).
    fn confirmations(&self) -> LedgerResult<ConfirmationStream>;
}
