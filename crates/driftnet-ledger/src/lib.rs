//! Ledger gateway contract for driftnet.
//!
//! The ledger itself is an external system; this crate specifies the narrow
//! client surface the submission pipeline needs:
//! - fingerprint ownership lookup
//! - balance lookup and balance waiting
//! - transaction construction and submission
//! - confirmation-event streaming
//!
//! [`MockLedger`] provides an in-memory implementation for tests and
//! embedding, with manual confirmation control and failure injection.

pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod mock;

pub use endpoint::Endpoint;
pub use error::{LedgerError, LedgerResult};
pub use gateway::{ChainParams, ConfirmationStream, LedgerGateway, PreparedTransaction};
pub use mock::MockLedger;
