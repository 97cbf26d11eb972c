//! The ledger collaborator contract
//!
//! Concord is a client-side protocol: the external ordered ledger is the
//! sole source of truth and the single arbiter of races. This module
//! fixes the contract surface the client depends on: contract ids,
//! command and argument names, the governed-action mapping for each
//! operation, and the async [`Ledger`] trait every backend implements.
//!
//! Every call has blocking-per-call semantics: it resolves once the
//! transaction is committed or refused, never earlier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::GovernedAction;
use crate::charter::{Charter, CharterId};
use crate::deferred::DeferredProposal;
use crate::errors::Result;
use crate::identity::Identity;
use crate::instruction::{InstanceId, Operation, Transaction};

/// Charter contract id
pub const CONTRACT_CHARTER: &str = "charter";
/// Deferred-proposal contract id
pub const CONTRACT_DEFERRED: &str = "deferred";
/// Access-right registry contract id
pub const CONTRACT_REGISTRY: &str = "registry";
/// Naming contract id
pub const CONTRACT_NAMING: &str = "naming";

/// Install the next charter version
pub const CMD_CHARTER_EVOLVE: &str = "evolve";
/// Record one identity's signature on a pending proposal
pub const CMD_DEFERRED_ADD_PROOF: &str = "add_proof";
/// Execute a pending proposal
pub const CMD_DEFERRED_EXECUTE: &str = "execute";
/// Replace a registry's record
pub const CMD_REGISTRY_UPDATE: &str = "update";
/// Bind a name to an instance
pub const CMD_NAMING_BIND: &str = "bind";

/// Charter payload argument (spawn and evolve)
pub const ARG_CHARTER: &str = "charter";
/// Encoded inner transaction of a deferred spawn
pub const ARG_PROPOSED_TX: &str = "proposed_tx";
/// Expiry block height of a deferred spawn, 8-byte little-endian
pub const ARG_EXPIRE_HEIGHT: &str = "expire_height";
/// Signing identity of an add_proof
pub const ARG_IDENTITY: &str = "identity";
/// Signature bytes of an add_proof
pub const ARG_SIGNATURE: &str = "signature";
/// Instruction index of an add_proof, 4-byte little-endian
pub const ARG_INDEX: &str = "index";
/// Encoded access-grant record (registry spawn and update)
pub const ARG_RECORD: &str = "record";
/// Instance to name in a naming bind
pub const ARG_INSTANCE_ID: &str = "instance_id";
/// Name to bind in a naming bind
pub const ARG_NAME: &str = "name";

/// Well-known name an access-right registry is bound under per project
pub const ACCESS_REGISTRY_NAME: &str = "AR";

/// Default expiry offset of a deferred proposal, in blocks
pub const DEFAULT_EXPIRY_OFFSET: u64 = 6000;

/// The governed action an operation falls under, used to pick which
/// charter rule gates it. Unknown contract or command pairs map to none
/// and are refused by the ledger.
pub fn action_for(operation: &Operation) -> Option<GovernedAction> {
    match operation {
        Operation::Spawn { contract, .. } => match contract.as_str() {
            CONTRACT_CHARTER => Some(GovernedAction::SpawnCharter),
            CONTRACT_DEFERRED => Some(GovernedAction::ProposeDeferred),
            CONTRACT_REGISTRY => Some(GovernedAction::SpawnRegistry),
            _ => None,
        },
        Operation::Invoke { contract, command, .. } => {
            match (contract.as_str(), command.as_str()) {
                (CONTRACT_CHARTER, CMD_CHARTER_EVOLVE) => Some(GovernedAction::EvolveCharter),
                (CONTRACT_DEFERRED, CMD_DEFERRED_ADD_PROOF) => Some(GovernedAction::Countersign),
                (CONTRACT_DEFERRED, CMD_DEFERRED_EXECUTE) => Some(GovernedAction::ExecuteDeferred),
                (CONTRACT_REGISTRY, CMD_REGISTRY_UPDATE) => Some(GovernedAction::UpdateRegistry),
                (CONTRACT_NAMING, CMD_NAMING_BIND) => Some(GovernedAction::BindName),
                _ => None,
            }
        }
    }
}

/// What the ledger reports for a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    /// Height of the block the transaction landed in
    pub height: u64,
}

/// The external ordered ledger, abstracted at its client interface
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a signed transaction and wait for total-order commit.
    /// Validates replay counters and signatures, then applies contract
    /// semantics; contract refusals surface as typed errors.
    async fn submit_and_wait(&self, tx: Transaction) -> Result<CommitMeta>;

    /// The genesis charter the ledger was bootstrapped with
    async fn genesis_charter(&self) -> Result<Charter>;

    /// Latest committed version of a charter
    async fn get_charter(&self, id: &CharterId) -> Result<Charter>;

    /// Current state of a deferred proposal
    async fn get_deferred(&self, id: &InstanceId) -> Result<DeferredProposal>;

    /// Serialized value of an instance, for direct ungated reads
    async fn get_proof(&self, id: &InstanceId) -> Result<Vec<u8>>;

    /// Resolve a name bound under a charter's scope
    async fn resolve_name(&self, scope: &CharterId, name: &str) -> Result<InstanceId>;

    /// Last committed replay counter for an identity; the next accepted
    /// value is one greater
    async fn signer_counter(&self, identity: &Identity) -> Result<u64>;

    /// Current block height
    async fn current_height(&self) -> Result<u64>;
}
