use serde::{Deserialize, Serialize};

use crate::tx::TxId;

/// Authoritative report from the ledger about a submitted transaction.
///
/// Produced by the ledger's confirmation stream and consumed exactly once
/// by the pipeline's listener, which uses it to retire or requeue the
/// matching pending submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEvent {
    /// The transaction this event resolves.
    pub tx_id: TxId,
    /// `true` if the transaction executed successfully.
    pub success: bool,
    /// Failure detail reported by the ledger, if any.
    pub error: Option<String>,
}

impl ConfirmationEvent {
    /// A successful confirmation.
    pub fn success(tx_id: TxId) -> Self {
        Self {
            tx_id,
            success: true,
            error: None,
        }
    }

    /// A failed (or rolled back / unconfirmed) transaction.
    pub fn failure(tx_id: TxId, error: impl Into<String>) -> Self {
        Self {
            tx_id,
            success: false,
            error: Some(error.into()),
        }
    }
}
