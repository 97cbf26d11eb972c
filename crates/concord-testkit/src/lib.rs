//! Concord Testkit
//!
//! Test infrastructure for driving the governance protocol without a real
//! ledger deployment: deterministic key fixtures and an in-process
//! [`InMemoryLedger`] that implements the collaborator contract
//! faithfully, including total-order commit, replay counters, signature
//! verification, charter evolution gating, and deferred-contract
//! semantics.

#![forbid(unsafe_code)]

/// Deterministic signing-key fixtures
pub mod keys;

/// In-process ledger implementing the collaborator contract
pub mod ledger;

pub use keys::seeded_signer;
pub use ledger::InMemoryLedger;
