//! Concord Core - governance data model
//!
//! This crate provides the data model shared by Concord clients and the
//! ledger collaborator: identities and signers, boolean policy expressions,
//! versioned policy charters, ledger-bound instructions with canonical
//! encodings, deferred-proposal views, access-grant records, and the
//! unified error type.
//!
//! # Architecture
//!
//! - `policy`: AND/OR expressions over identities (unanimity / any-of)
//! - `action`: the governed-action table mapping each action to its
//!   policy kind
//! - `charter`: versioned, content-addressed rule documents
//! - `instruction`: state-change instructions and transactions
//! - `deferred`: the ledger's view of a pending multi-signature proposal
//! - `registry`: per-project querier capability grants
//! - `ledger`: the async collaborator contract implemented by real and
//!   in-memory ledgers
//!
//! All wire-visible types serialize with `serde`; the canonical binary
//! encoding at the ledger boundary is `bincode` over deterministic
//! (`BTreeMap`-ordered) structures.

#![forbid(unsafe_code)]

/// Governed actions and their policy kinds
pub mod action;

/// Versioned policy charters
pub mod charter;

/// Deferred proposal views
pub mod deferred;

/// Unified error handling
pub mod errors;

/// Content-addressing hash, single source of truth
pub mod hash;

/// Identities and signing keys
pub mod identity;

/// Instructions, transactions, and canonical encodings
pub mod instruction;

/// The ledger collaborator contract
pub mod ledger;

/// Boolean policy expressions
pub mod policy;

/// Access-grant records
pub mod registry;

pub use errors::{Error, Result};
