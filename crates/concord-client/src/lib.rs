//! Concord Client - the governance orchestrator
//!
//! [`AdminClient`] is the library surface consumed by higher-level
//! tooling. It composes the policy expression engine, charter evolution,
//! the deferred-transaction protocol, and the access-right registry into
//! the operations administrators actually perform: admin add/remove/
//! rotate, project creation, querier grant/revoke/modify, and
//! authorization checks.
//!
//! Each client holds one identity's signing key and replay counter and
//! issues one blocking ledger call at a time. Independent admins run
//! independent clients, typically in separate processes, against the
//! same ledger; the ledger's total order is the only arbiter of races.

#![forbid(unsafe_code)]

/// The admin client
pub mod client;

/// Client configuration
pub mod config;

pub use client::AdminClient;
pub use config::ClientConfig;
