use std::fmt;

use serde::{Deserialize, Serialize};

/// Classifies the payload type of an [`Item`](crate::Item).
///
/// Schema ids are derived by hashing a well-known schema name, so every
/// participant that agrees on the name agrees on the id without any
/// registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId([u8; 32]);

impl SchemaId {
    /// Derive a schema id from a schema name, e.g. `"nft-metadata-v1"`.
    pub fn derive(name: &str) -> Self {
        Self(*blake3::hash(name.as_bytes()).as_bytes())
    }

    /// Wrap a pre-computed 32-byte id.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte id.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex representation (first 8 characters), for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaId({})", self.short_hex())
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(SchemaId::derive("meme-v1"), SchemaId::derive("meme-v1"));
    }

    #[test]
    fn different_names_differ() {
        assert_ne!(SchemaId::derive("meme-v1"), SchemaId::derive("nft-v1"));
    }
}
