//! Unified error system for Concord
//!
//! A single error type shared by the core model, clients, and ledger
//! implementations. Variants carry enough context (action, proposal id,
//! heights, counter values) for the caller to decide between retry and
//! abort without parsing message strings.

use serde::{Deserialize, Serialize};

/// Unified error type for all Concord operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// Malformed input: mixed-operator expression, empty voter list, or an
    /// identity present/absent when the operation requires otherwise
    #[error("Validation: {message}")]
    Validation {
        /// What was malformed
        message: String,
    },

    /// The collected signer set does not (yet) satisfy the governed rule.
    /// Recoverable: collect more signatures and retry.
    #[error("Authorization for {action}: {message}")]
    Authorization {
        /// Governed action whose rule was not satisfied
        action: String,
        /// Why the rule was not satisfied
        message: String,
    },

    /// Action attempted past the proposal's expiry height. Fatal for that
    /// proposal; no retry can succeed.
    #[error("Expired: ledger height {height} is past expiry height {expire_height}")]
    Expired {
        /// Ledger height at the time of the attempt
        height: u64,
        /// The proposal's expiry height
        expire_height: u64,
    },

    /// Stale or incorrect replay counter. Recoverable: refresh the counter
    /// and retry.
    #[error("Replay: counter for {identity} expected {expected}, got {got}")]
    Replay {
        /// Identity whose counter was wrong
        identity: String,
        /// The ledger's expected next counter value
        expected: u64,
        /// The counter value the transaction carried
        got: u64,
    },

    /// Unknown proposal, charter, instance, name, voter, or querier
    #[error("Not found: {what}")]
    NotFound {
        /// What was looked up and missed
        what: String,
    },

    /// Duplicate creation attempt
    #[error("Already exists: {what}")]
    AlreadyExists {
        /// What already exists
        what: String,
    },

    /// Second execution attempt on an already-executed proposal
    #[error("Already executed: proposal {proposal}")]
    AlreadyExecuted {
        /// The proposal's instance id
        proposal: String,
    },

    /// Serialization or deserialization failure; a programmer or data
    /// corruption error, never retried
    #[error("Encoding: {message}")]
    Encoding {
        /// What failed to round-trip
        message: String,
    },

    /// Transport or collaborator failure surfaced from the ledger side
    #[error("Ledger: {message}")]
    Ledger {
        /// What the ledger reported
        message: String,
    },
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create an authorization error for a governed action
    pub fn authorization(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authorization { action: action.into(), message: message.into() }
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an already-exists error
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding { message: message.into() }
    }

    /// Create a ledger transport error
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger { message: message.into() }
    }

    /// Whether the caller may retry after corrective action: collecting
    /// more signatures (`Authorization`) or refreshing the replay counter
    /// (`Replay`). All other variants are terminal for the attempted
    /// operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Authorization { .. } | Self::Replay { .. })
    }
}

/// Result alias for Concord operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_exactly_the_recoverable_conditions() {
        assert!(Error::authorization("charter.evolve", "2 of 3 signatures").is_retryable());
        assert!(Error::Replay {
            identity: "ed25519:00".into(),
            expected: 4,
            got: 3
        }
        .is_retryable());

        assert!(!Error::Expired { height: 7000, expire_height: 6000 }.is_retryable());
        assert!(!Error::not_found("proposal").is_retryable());
        assert!(!Error::AlreadyExecuted { proposal: "ab".into() }.is_retryable());
        assert!(!Error::encoding("truncated record").is_retryable());
    }
}
