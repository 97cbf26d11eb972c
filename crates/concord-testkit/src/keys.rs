//! Deterministic signing-key fixtures
//!
//! Tests that exercise multi-admin scenarios need stable identities so
//! failures reproduce byte-for-byte. Each fixture index expands to a
//! distinct 32-byte seed.

use concord_core::identity::Signer;

/// Deterministic signer for fixture index `n`
pub fn seeded_signer(n: u8) -> Signer {
    let mut seed = [0u8; 32];
    seed[0] = n;
    seed[31] = n.wrapping_add(1);
    Signer::from_seed(seed)
}
