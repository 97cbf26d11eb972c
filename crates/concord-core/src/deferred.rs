//! Deferred proposal views
//!
//! The ledger's record of a pending multi-signature proposal. Signatures
//! accumulate monotonically per instruction index, at most one per
//! identity, until the proposal is executed exactly once or its expiry
//! height passes. "Executable" is never stored: it is re-derived from the
//! collected set at the moment execution is attempted.
//!
//! # Lifecycle
//!
//! ```text
//! Proposed → Executed   (terminal success, exactly once)
//! Proposed → Expired    (terminal failure, height > expire_height)
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{Error, Result};
use crate::hash::Digest32;
use crate::identity::{Identity, Signature};
use crate::instruction::Transaction;

/// A pending proposal as stored by the ledger's deferred contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredProposal {
    /// The transaction that will run when the proposal executes
    pub proposed: Transaction,
    /// Block height after which execution is permanently rejected
    pub expire_height: u64,
    /// Content digest of each proposed instruction; what signers sign
    pub instruction_digests: Vec<Digest32>,
    /// Collected signatures per instruction index, insertion ordered,
    /// at most one per identity
    pub collected: Vec<IndexMap<Identity, Signature>>,
    /// Whether the proposal has already executed
    pub executed: bool,
}

impl DeferredProposal {
    /// Fresh proposal over `proposed`, nothing collected yet
    pub fn new(proposed: Transaction, expire_height: u64) -> Self {
        let instruction_digests = proposed.digests();
        let collected = vec![IndexMap::new(); instruction_digests.len()];
        Self { proposed, expire_height, instruction_digests, collected, executed: false }
    }

    /// The digest signers must sign for `index`
    pub fn digest_at(&self, index: usize) -> Result<&Digest32> {
        self.instruction_digests
            .get(index)
            .ok_or_else(|| Error::validation(format!("instruction index {index} out of range")))
    }

    /// Record a signature for `identity` at `index`. Re-signing by an
    /// identity that already signed is a no-op: the first signature stays
    /// and never counts as a second vote.
    pub fn add_signature(&mut self, index: usize, identity: Identity, signature: Signature) -> Result<()> {
        let slot = self
            .collected
            .get_mut(index)
            .ok_or_else(|| Error::validation(format!("instruction index {index} out of range")))?;
        slot.entry(identity).or_insert(signature);
        Ok(())
    }

    /// Identities that have signed instruction `index`
    pub fn signers_at(&self, index: usize) -> BTreeSet<Identity> {
        self.collected
            .get(index)
            .map(|slot| slot.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `height` is past this proposal's expiry
    pub fn is_expired_at(&self, height: u64) -> bool {
        height > self.expire_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Signer;
    use crate::instruction::{Argument, Instruction, InstanceId};

    fn proposal() -> DeferredProposal {
        let instruction = Instruction::invoke(
            InstanceId([1u8; 32]),
            "registry",
            "update",
            vec![Argument::bytes("record", vec![9])],
        );
        DeferredProposal::new(Transaction::single(instruction), 6000)
    }

    #[test]
    fn re_signing_keeps_exactly_one_signature_per_identity() {
        let mut p = proposal();
        let signer = Signer::from_seed([1u8; 32]);
        let digest = *p.digest_at(0).unwrap();

        let first = signer.sign(&digest);
        p.add_signature(0, signer.identity(), first.clone()).unwrap();
        p.add_signature(0, signer.identity(), signer.sign(&digest)).unwrap();

        assert_eq!(p.collected[0].len(), 1);
        assert_eq!(p.collected[0][&signer.identity()], first);
        assert_eq!(p.signers_at(0).len(), 1);
    }

    #[test]
    fn signatures_accumulate_in_insertion_order() {
        let mut p = proposal();
        let a = Signer::from_seed([1u8; 32]);
        let b = Signer::from_seed([2u8; 32]);
        let digest = *p.digest_at(0).unwrap();

        p.add_signature(0, b.identity(), b.sign(&digest)).unwrap();
        p.add_signature(0, a.identity(), a.sign(&digest)).unwrap();

        let order: Vec<_> = p.collected[0].keys().cloned().collect();
        assert_eq!(order, vec![b.identity(), a.identity()]);
    }

    #[test]
    fn expiry_is_strictly_past_the_expiry_height() {
        let p = proposal();
        assert!(!p.is_expired_at(5999));
        assert!(!p.is_expired_at(6000));
        assert!(p.is_expired_at(6001));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut p = proposal();
        let signer = Signer::from_seed([3u8; 32]);
        let err = p.add_signature(1, signer.identity(), signer.sign(b"x")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(p.digest_at(1).is_err());
    }
}
