use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::fingerprint::Fingerprint;
use crate::schema::SchemaId;

/// Maximum serialized payload size accepted by the ledger, in bytes.
///
/// Payloads are content references and small metadata blobs, not the
/// content itself; anything larger is rejected at transaction construction.
pub const MAX_PAYLOAD_SIZE: usize = 4 * 1024;

/// A discovered unit of content to register on the ledger.
///
/// Items are immutable once enqueued: the pipeline moves them between
/// workers by ownership transfer and never mutates them. The fingerprint is
/// derived from the schema id and payload, so the same content discovered
/// twice (or replayed after a crash) resolves to the same ledger key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Classifies the payload type.
    pub schema: SchemaId,
    /// Serialized payload, at most [`MAX_PAYLOAD_SIZE`] bytes.
    pub payload: Vec<u8>,
    /// Royalty hint in ledger base units; `0` means no royalty is claimed.
    pub royalty: u64,
}

impl Item {
    /// Create an item with no royalty hint.
    pub fn new(schema: SchemaId, payload: Vec<u8>) -> Self {
        Self {
            schema,
            payload,
            royalty: 0,
        }
    }

    /// Create an item with a royalty hint.
    pub fn with_royalty(schema: SchemaId, payload: Vec<u8>, royalty: u64) -> Self {
        Self {
            schema,
            payload,
            royalty,
        }
    }

    /// Compute the content fingerprint: BLAKE3 over schema id then payload.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.schema.as_bytes());
        hasher.update(&self.payload);
        Fingerprint::from_hash(*hasher.finalize().as_bytes())
    }

    /// Validate payload bounds. Enforced at transaction construction.
    pub fn check_payload_size(&self) -> Result<(), TypeError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TypeError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaId {
        SchemaId::derive("test-schema-v1")
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Item::new(schema(), b"hello".to_vec());
        let b = Item::new(schema(), b"hello".to_vec());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_depends_on_schema() {
        let a = Item::new(SchemaId::derive("one"), b"hello".to_vec());
        let b = Item::new(SchemaId::derive("two"), b"hello".to_vec());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn royalty_does_not_change_fingerprint() {
        // Royalty is a submission hint, not content.
        let a = Item::new(schema(), b"x".to_vec());
        let b = Item::with_royalty(schema(), b"x".to_vec(), 1);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn oversized_payload_rejected() {
        let item = Item::new(schema(), vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        assert!(matches!(
            item.check_payload_size(),
            Err(TypeError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn max_payload_accepted() {
        let item = Item::new(schema(), vec![0u8; MAX_PAYLOAD_SIZE]);
        assert!(item.check_payload_size().is_ok());
    }

    #[test]
    fn serde_roundtrip() {
        let item = Item::with_royalty(schema(), b"payload".to_vec(), 1);
        let bytes = bincode::serialize(&item).unwrap();
        let back: Item = bincode::deserialize(&bytes).unwrap();
        assert_eq!(item, back);
    }
}
