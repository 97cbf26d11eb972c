//! Content-addressing hash, single source of truth
//!
//! One place selects the digest algorithm used for charter ids, instruction
//! digests, and derived instance ids. Call sites use `hash` or `hasher` and
//! never name the algorithm directly.
//!
//! Current algorithm: SHA-256 (32-byte output).

use sha2::{Digest, Sha256};

/// Digest output size in bytes
pub const DIGEST_LEN: usize = 32;

/// A 32-byte content digest
pub type Digest32 = [u8; DIGEST_LEN];

/// Hash a single buffer
pub fn hash(data: &[u8]) -> Digest32 {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

/// Incremental hasher for multi-part input
pub struct Hasher(Sha256);

impl Hasher {
    /// Start a fresh digest
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// Absorb a length-prefixed field, keeping the digest unambiguous
    /// across adjacent variable-length fields
    pub fn field(&mut self, data: &[u8]) {
        self.0.update((data.len() as u64).to_le_bytes());
        self.0.update(data);
    }

    /// Finalize into a 32-byte digest
    pub fn finalize(self) -> Digest32 {
        self.0.finalize().into()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}
