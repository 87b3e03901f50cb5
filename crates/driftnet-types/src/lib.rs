//! Foundation types for driftnet.
//!
//! This crate provides the identifiers and data model shared by every other
//! driftnet crate. Every other driftnet crate depends on `driftnet-types`.
//!
//! # Key Types
//!
//! - [`Fingerprint`] — Content-derived identifier (BLAKE3 hash) used for
//!   dedup and ownership lookup
//! - [`SchemaId`] — Classifies an item's payload type
//! - [`Address`] — Ledger identity of a submitter or content owner
//! - [`TxId`] — In-flight transaction identifier
//! - [`Item`] — A discovered unit of content to register on the ledger
//! - [`ConfirmationEvent`] — Authoritative success/failure report from the
//!   ledger's confirmation stream

pub mod address;
pub mod confirmation;
pub mod error;
pub mod fingerprint;
pub mod item;
pub mod schema;
pub mod tx;

pub use address::Address;
pub use confirmation::ConfirmationEvent;
pub use error::TypeError;
pub use fingerprint::Fingerprint;
pub use item::{Item, MAX_PAYLOAD_SIZE};
pub use schema::SchemaId;
pub use tx::TxId;
