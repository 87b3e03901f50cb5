/// Errors produced by ledger gateway operations.
///
/// The variants encode the pipeline's error taxonomy. The load-bearing
/// distinction is item-level versus infrastructure-level: a [`Transient`]
/// or [`Construction`] failure costs at most one item, while [`Submission`]
/// and [`Connection`] failures abort the whole pipeline.
///
/// [`Transient`]: LedgerError::Transient
/// [`Construction`]: LedgerError::Construction
/// [`Submission`]: LedgerError::Submission
/// [`Connection`]: LedgerError::Connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Network or query failure; the call may be retried.
    #[error("transient ledger error: {0}")]
    Transient(String),

    /// The item cannot be turned into a valid transaction. Non-retryable;
    /// the item is dropped and logged.
    #[error("transaction construction failed: {0}")]
    Construction(String),

    /// The ledger rejected the transaction outright (as opposed to the
    /// transaction later failing execution). Fatal to the pipeline.
    #[error("transaction submission rejected: {0}")]
    Submission(String),

    /// The connection to the ledger was lost. Fatal to the pipeline.
    #[error("ledger connection error: {0}")]
    Connection(String),

    /// The single-consumer confirmation stream was already taken.
    #[error("confirmation stream already consumed")]
    StreamConsumed,
}

impl LedgerError {
    /// Returns `true` if the operation may be retried against the same
    /// ledger without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` if this error should bring down the whole pipeline
    /// rather than being absorbed at the item boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Submission(_) | Self::Connection(_) | Self::StreamConsumed
        )
    }
}

/// Result alias for gateway operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
