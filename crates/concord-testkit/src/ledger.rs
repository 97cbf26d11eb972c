//! In-process ledger implementing the collaborator contract
//!
//! [`InMemoryLedger`] is a faithful model of the external ordered ledger
//! for tests: one `RwLock` around the whole state gives total-order
//! commit, one block per committed transaction, per-identity replay
//! counters, signature verification on every instruction, charter
//! evolution gated by the previous version's rule, and deferred-contract
//! semantics (idempotent proof collection, expiry, exactly-once
//! execution, per-instruction rule evaluation over the verified collected
//! signer set).
//!
//! Commit semantics mirror a real chain: structural validation, replay
//! counters, signatures, and the submitter's own authorization are
//! checked before inclusion and reject the transaction outright; once
//! included, the block height advances and counters burn even when the
//! contract itself refuses (unsatisfied execution, expiry, double
//! execution). Clients therefore resynchronize their counter after any
//! failed submission.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use concord_core::action::GovernedAction;
use concord_core::charter::{Charter, CharterId};
use concord_core::deferred::DeferredProposal;
use concord_core::errors::{Error, Result};
use concord_core::identity::{self, Identity, Signature};
use concord_core::instruction::{InstanceId, Instruction, Operation, Transaction};
use concord_core::ledger::{
    action_for, CommitMeta, Ledger, ARG_CHARTER, ARG_EXPIRE_HEIGHT, ARG_IDENTITY, ARG_INDEX,
    ARG_INSTANCE_ID, ARG_NAME, ARG_PROPOSED_TX, ARG_RECORD, ARG_SIGNATURE, CMD_CHARTER_EVOLVE,
    CMD_DEFERRED_ADD_PROOF, CMD_DEFERRED_EXECUTE, CMD_NAMING_BIND, CMD_REGISTRY_UPDATE,
    CONTRACT_CHARTER, CONTRACT_DEFERRED, CONTRACT_NAMING, CONTRACT_REGISTRY,
};
use concord_core::registry::AccessGrants;

/// What lives at an instance id
#[derive(Debug, Clone)]
enum InstanceBody {
    /// A charter instance; the charter itself lives in the charter store
    Charter(CharterId),
    /// A pending or executed deferred proposal
    Deferred(DeferredProposal),
    /// An access-right registry's encoded record
    Registry(Vec<u8>),
}

#[derive(Debug, Clone)]
struct InstanceEntry {
    /// The charter whose rules govern operations on this instance
    charter: CharterId,
    body: InstanceBody,
}

#[derive(Debug)]
struct State {
    height: u64,
    /// Last committed counter per identity; next accepted is one greater
    counters: HashMap<Identity, u64>,
    /// Latest committed version per charter
    charters: HashMap<CharterId, Charter>,
    instances: HashMap<InstanceId, InstanceEntry>,
    /// Name bindings scoped by governing charter
    names: HashMap<(CharterId, String), InstanceId>,
    genesis: CharterId,
}

/// In-memory ledger with total-order commit semantics
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl InMemoryLedger {
    /// Bootstrap a chain whose genesis charter has `identity` as its sole
    /// voter
    pub fn bootstrap(identity: Identity) -> Result<Self> {
        let genesis = Charter::new("concord genesis", &[identity])?;
        let genesis_id = genesis.base_id;

        let mut charters = HashMap::new();
        charters.insert(genesis_id, genesis);
        let mut instances = HashMap::new();
        instances.insert(
            genesis_id.instance_id(),
            InstanceEntry { charter: genesis_id, body: InstanceBody::Charter(genesis_id) },
        );

        Ok(Self {
            state: RwLock::new(State {
                height: 0,
                counters: HashMap::new(),
                charters,
                instances,
                names: HashMap::new(),
                genesis: genesis_id,
            }),
        })
    }

    /// Test hook: advance the chain by `blocks` empty blocks, for expiry
    /// scenarios
    pub fn advance_height(&self, blocks: u64) {
        self.state.write().height += blocks;
    }

    /// The charter whose rules govern `operation` on `target`. Naming
    /// binds are governed by the charter of the instance being named, not
    /// by the naming singleton.
    fn scope_of(state: &State, target: &InstanceId, operation: &Operation) -> Result<CharterId> {
        if let Operation::Invoke { contract, command, .. } = operation {
            if contract == CONTRACT_NAMING && command == CMD_NAMING_BIND {
                let named = InstanceId::from_slice(arg(operation, ARG_INSTANCE_ID)?)?;
                return Self::entry(state, &named).map(|e| e.charter);
            }
        }
        Self::entry(state, target).map(|e| e.charter)
    }

    fn entry<'a>(state: &'a State, id: &InstanceId) -> Result<&'a InstanceEntry> {
        state.instances.get(id).ok_or_else(|| Error::not_found(format!("instance {id}")))
    }

    fn check_rule(
        state: &State,
        scope: CharterId,
        action: GovernedAction,
        signers: &BTreeSet<Identity>,
    ) -> Result<()> {
        let charter = state
            .charters
            .get(&scope)
            .ok_or_else(|| Error::not_found(format!("charter {scope}")))?;
        let rule = charter.rule(action)?;
        if rule.is_satisfied_by(signers) {
            return Ok(());
        }
        let required = rule.identities();
        let have = required.iter().filter(|id| signers.contains(id)).count();
        Err(Error::authorization(
            action.name(),
            format!("{have} of {} required signatures collected", required.len()),
        ))
    }

    /// Pre-inclusion validation: structure, replay counters, signatures,
    /// and the submitter's authorization for the outer operation
    fn validate(state: &State, instruction: &Instruction) -> Result<()> {
        if instruction.signers.is_empty() {
            return Err(Error::validation("instruction carries no signers"));
        }
        if instruction.signers.len() != instruction.signatures.len()
            || instruction.signers.len() != instruction.signer_counters.len()
        {
            return Err(Error::validation("signers, signatures, and counters must be parallel"));
        }

        for (i, signer) in instruction.signers.iter().enumerate() {
            let expected = state.counters.get(signer).copied().unwrap_or(0) + 1;
            let got = instruction.signer_counters[i];
            if got != expected {
                return Err(Error::Replay { identity: signer.to_string(), expected, got });
            }
        }

        let digest = instruction.digest();
        for (signer, signature) in instruction.signers.iter().zip(&instruction.signatures) {
            if !identity::verify(signer, &digest, signature) {
                return Err(Error::validation(format!("signature of {signer} does not verify")));
            }
        }

        let action = action_for(&instruction.operation)
            .ok_or_else(|| Error::validation("operation is not governed by any contract"))?;
        let scope = Self::scope_of(state, &instruction.target, &instruction.operation)?;
        let signers: BTreeSet<Identity> = instruction.signers.iter().cloned().collect();
        Self::check_rule(state, scope, action, &signers)
    }

    /// Contract semantics, applied after inclusion. Errors returned here
    /// are contract refusals: the block stands and counters stay burned.
    fn apply(state: &mut State, instruction: &Instruction) -> Result<()> {
        match &instruction.operation {
            Operation::Spawn { contract, .. } => match contract.as_str() {
                CONTRACT_CHARTER => Self::apply_spawn_charter(state, instruction),
                CONTRACT_DEFERRED => Self::apply_spawn_deferred(state, instruction),
                CONTRACT_REGISTRY => Self::apply_spawn_registry(state, instruction),
                other => Err(Error::validation(format!("unknown contract {other}"))),
            },
            Operation::Invoke { contract, command, .. } => {
                match (contract.as_str(), command.as_str()) {
                    (CONTRACT_CHARTER, CMD_CHARTER_EVOLVE) => Self::apply_evolve(state, instruction),
                    (CONTRACT_DEFERRED, CMD_DEFERRED_ADD_PROOF) => Self::apply_add_proof(state, instruction),
                    (CONTRACT_DEFERRED, CMD_DEFERRED_EXECUTE) => Self::apply_execute(state, instruction),
                    (CONTRACT_REGISTRY, CMD_REGISTRY_UPDATE) => Self::apply_registry_update(state, instruction),
                    (CONTRACT_NAMING, CMD_NAMING_BIND) => Self::apply_bind(state, instruction),
                    (contract, command) => {
                        Err(Error::validation(format!("unknown command {contract}.{command}")))
                    }
                }
            }
        }
    }

    fn apply_spawn_charter(state: &mut State, instruction: &Instruction) -> Result<()> {
        let charter = Charter::decode(arg(&instruction.operation, ARG_CHARTER)?)?;
        if charter.version != 0 {
            return Err(Error::validation(format!(
                "spawned charter must be version 0, got {}",
                charter.version
            )));
        }
        if state.charters.contains_key(&charter.base_id) {
            return Err(Error::already_exists(format!("charter {}", charter.base_id)));
        }
        let id = charter.base_id;
        state.charters.insert(id, charter);
        // Charters govern themselves: their own rules gate their evolution.
        state
            .instances
            .insert(id.instance_id(), InstanceEntry { charter: id, body: InstanceBody::Charter(id) });
        Ok(())
    }

    fn apply_spawn_deferred(state: &mut State, instruction: &Instruction) -> Result<()> {
        let proposed = Transaction::decode(arg(&instruction.operation, ARG_PROPOSED_TX)?)?;
        let expire_height = arg_u64(&instruction.operation, ARG_EXPIRE_HEIGHT)?;
        if proposed.instructions.is_empty() {
            return Err(Error::validation("proposed transaction has no instructions"));
        }
        for inner in &proposed.instructions {
            let action = action_for(&inner.operation)
                .ok_or_else(|| Error::validation("proposed operation is not governed by any contract"))?;
            if matches!(
                action,
                GovernedAction::ProposeDeferred | GovernedAction::Countersign | GovernedAction::ExecuteDeferred
            ) {
                return Err(Error::validation("deferred operations cannot be nested in a proposal"));
            }
        }

        let id = instruction.derive_instance_id();
        if state.instances.contains_key(&id) {
            return Err(Error::already_exists(format!("proposal {id}")));
        }
        let scope = Self::entry(state, &instruction.target)?.charter;
        state.instances.insert(
            id,
            InstanceEntry {
                charter: scope,
                body: InstanceBody::Deferred(DeferredProposal::new(proposed, expire_height)),
            },
        );
        Ok(())
    }

    fn apply_spawn_registry(state: &mut State, instruction: &Instruction) -> Result<()> {
        let record = arg(&instruction.operation, ARG_RECORD)?.to_vec();
        AccessGrants::decode(&record)?;
        let id = instruction.derive_instance_id();
        if state.instances.contains_key(&id) {
            return Err(Error::already_exists(format!("registry {id}")));
        }
        let scope = Self::entry(state, &instruction.target)?.charter;
        state
            .instances
            .insert(id, InstanceEntry { charter: scope, body: InstanceBody::Registry(record) });
        Ok(())
    }

    fn apply_evolve(state: &mut State, instruction: &Instruction) -> Result<()> {
        let next = Charter::decode(arg(&instruction.operation, ARG_CHARTER)?)?;
        let current = state
            .charters
            .get(&next.base_id)
            .ok_or_else(|| Error::not_found(format!("charter {}", next.base_id)))?;
        if next.version != current.version + 1 {
            return Err(Error::authorization(
                GovernedAction::EvolveCharter.name(),
                format!(
                    "evolution to version {} superseded, current version is {}",
                    next.version, current.version
                ),
            ));
        }
        state.charters.insert(next.base_id, next);
        Ok(())
    }

    fn apply_registry_update(state: &mut State, instruction: &Instruction) -> Result<()> {
        let record = arg(&instruction.operation, ARG_RECORD)?.to_vec();
        AccessGrants::decode(&record)?;
        let entry = state
            .instances
            .get_mut(&instruction.target)
            .ok_or_else(|| Error::not_found(format!("instance {}", instruction.target)))?;
        match &mut entry.body {
            InstanceBody::Registry(bytes) => {
                *bytes = record;
                Ok(())
            }
            _ => Err(Error::validation(format!("instance {} is not a registry", instruction.target))),
        }
    }

    fn apply_add_proof(state: &mut State, instruction: &Instruction) -> Result<()> {
        let height = state.height;
        let signer = Identity::parse(
            std::str::from_utf8(arg(&instruction.operation, ARG_IDENTITY)?)
                .map_err(|_| Error::validation("identity argument is not utf-8"))?,
        )?;
        let signature = Signature::from_bytes(arg(&instruction.operation, ARG_SIGNATURE)?.to_vec());
        let index = arg_u32(&instruction.operation, ARG_INDEX)? as usize;

        let entry = state
            .instances
            .get_mut(&instruction.target)
            .ok_or_else(|| Error::not_found(format!("instance {}", instruction.target)))?;
        let InstanceBody::Deferred(proposal) = &mut entry.body else {
            return Err(Error::validation(format!("instance {} is not a proposal", instruction.target)));
        };

        if proposal.executed {
            return Err(Error::AlreadyExecuted { proposal: instruction.target.to_string() });
        }
        if proposal.is_expired_at(height) {
            return Err(Error::Expired { height, expire_height: proposal.expire_height });
        }
        let digest = *proposal.digest_at(index)?;
        if !identity::verify(&signer, &digest, &signature) {
            return Err(Error::validation(format!("proof signature of {signer} does not verify")));
        }
        proposal.add_signature(index, signer, signature)
    }

    fn apply_execute(state: &mut State, instruction: &Instruction) -> Result<()> {
        let height = state.height;
        let proposal = match &Self::entry(state, &instruction.target)?.body {
            InstanceBody::Deferred(p) => p.clone(),
            _ => {
                return Err(Error::validation(format!(
                    "instance {} is not a proposal",
                    instruction.target
                )))
            }
        };

        if proposal.executed {
            return Err(Error::AlreadyExecuted { proposal: instruction.target.to_string() });
        }
        if proposal.is_expired_at(height) {
            return Err(Error::Expired { height, expire_height: proposal.expire_height });
        }

        // Every inner instruction's governed rule must hold over the
        // verified collected signer set before anything is applied.
        for (index, inner) in proposal.proposed.instructions.iter().enumerate() {
            let action = action_for(&inner.operation)
                .ok_or_else(|| Error::validation("proposed operation is not governed by any contract"))?;
            let scope = Self::scope_of(state, &inner.target, &inner.operation)?;
            Self::check_rule(state, scope, action, &proposal.signers_at(index))?;
        }

        for inner in &proposal.proposed.instructions {
            Self::apply(state, inner)?;
        }

        if let Some(entry) = state.instances.get_mut(&instruction.target) {
            if let InstanceBody::Deferred(p) = &mut entry.body {
                p.executed = true;
            }
        }
        Ok(())
    }

    fn apply_bind(state: &mut State, instruction: &Instruction) -> Result<()> {
        let named = InstanceId::from_slice(arg(&instruction.operation, ARG_INSTANCE_ID)?)?;
        let name = std::str::from_utf8(arg(&instruction.operation, ARG_NAME)?)
            .map_err(|_| Error::validation("name argument is not utf-8"))?
            .to_string();
        let scope = Self::entry(state, &named)?.charter;
        let key = (scope, name);
        if state.names.contains_key(&key) {
            return Err(Error::already_exists(format!("name {} under {}", key.1, key.0)));
        }
        state.names.insert(key, named);
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn submit_and_wait(&self, tx: Transaction) -> Result<CommitMeta> {
        let mut state = self.state.write();
        let [instruction] = tx.instructions.as_slice() else {
            return Err(Error::validation("this ledger commits single-instruction transactions"));
        };

        Self::validate(&state, instruction)?;

        // Included: the block stands and counters burn regardless of the
        // contract outcome below.
        state.height += 1;
        for signer in &instruction.signers {
            *state.counters.entry(signer.clone()).or_insert(0) += 1;
        }
        let height = state.height;

        match Self::apply(&mut state, instruction) {
            Ok(()) => {
                debug!(height, target = %instruction.target, "transaction committed");
                Ok(CommitMeta { height })
            }
            Err(e) => {
                debug!(height, target = %instruction.target, error = %e, "contract refused");
                Err(e)
            }
        }
    }

    async fn genesis_charter(&self) -> Result<Charter> {
        let state = self.state.read();
        state
            .charters
            .get(&state.genesis)
            .cloned()
            .ok_or_else(|| Error::not_found("genesis charter"))
    }

    async fn get_charter(&self, id: &CharterId) -> Result<Charter> {
        self.state
            .read()
            .charters
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("charter {id}")))
    }

    async fn get_deferred(&self, id: &InstanceId) -> Result<DeferredProposal> {
        let state = self.state.read();
        match Self::entry(&state, id)? {
            InstanceEntry { body: InstanceBody::Deferred(p), .. } => Ok(p.clone()),
            _ => Err(Error::not_found(format!("proposal {id}"))),
        }
    }

    async fn get_proof(&self, id: &InstanceId) -> Result<Vec<u8>> {
        let state = self.state.read();
        match &Self::entry(&state, id)?.body {
            InstanceBody::Registry(bytes) => Ok(bytes.clone()),
            InstanceBody::Charter(cid) => state
                .charters
                .get(cid)
                .ok_or_else(|| Error::not_found(format!("charter {cid}")))?
                .encode(),
            InstanceBody::Deferred(p) => {
                bincode::serialize(p).map_err(|e| Error::encoding(format!("proposal: {e}")))
            }
        }
    }

    async fn resolve_name(&self, scope: &CharterId, name: &str) -> Result<InstanceId> {
        self.state
            .read()
            .names
            .get(&(*scope, name.to_string()))
            .copied()
            .ok_or_else(|| Error::not_found(format!("name {name} under {scope}")))
    }

    async fn signer_counter(&self, identity: &Identity) -> Result<u64> {
        Ok(self.state.read().counters.get(identity).copied().unwrap_or(0))
    }

    async fn current_height(&self) -> Result<u64> {
        Ok(self.state.read().height)
    }
}

fn arg<'a>(operation: &'a Operation, name: &str) -> Result<&'a [u8]> {
    operation
        .arg(name)
        .ok_or_else(|| Error::validation(format!("missing argument {name}")))
}

fn arg_u64(operation: &Operation, name: &str) -> Result<u64> {
    let bytes: [u8; 8] = arg(operation, name)?
        .try_into()
        .map_err(|_| Error::validation(format!("argument {name} must be 8 little-endian bytes")))?;
    Ok(u64::from_le_bytes(bytes))
}

fn arg_u32(operation: &Operation, name: &str) -> Result<u32> {
    let bytes: [u8; 4] = arg(operation, name)?
        .try_into()
        .map_err(|_| Error::validation(format!("argument {name} must be 4 little-endian bytes")))?;
    Ok(u32::from_le_bytes(bytes))
}
