//! Client configuration

use concord_core::ledger::DEFAULT_EXPIRY_OFFSET;

/// Tunables of an [`crate::AdminClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// How many blocks ahead of the current height a new proposal
    /// expires. Past that height the proposal is permanently
    /// unexecutable, which is also the only way to abandon one.
    pub expiry_offset: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { expiry_offset: DEFAULT_EXPIRY_OFFSET }
    }
}
