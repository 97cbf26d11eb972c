//! The admin client
//!
//! One [`AdminClient`] per admin identity. Every state-changing
//! governance operation is routed through the deferred-transaction
//! pipeline: build the inner instruction, wrap it in a deferred spawn,
//! let admins countersign, then trigger execution. The ledger validates
//! the collected signer set against the governing charter's rules at
//! execution time, so unanimity is enforced where it matters and never
//! cached client-side.
//!
//! The replay counter is private to this client and moves in exactly one
//! place: the post-commit hook of [`AdminClient::submit_signed`]. After a
//! failed submission the client resynchronizes from the ledger, since a
//! contract refusal still burns the counter on-chain.

use std::sync::Arc;
use tracing::{debug, info};

use concord_core::charter::{Charter, CharterId};
use concord_core::errors::{Error, Result};
use concord_core::identity::{Identity, Signer};
use concord_core::instruction::{Argument, InstanceId, Instruction, Transaction};
use concord_core::ledger::{
    CommitMeta, Ledger, ACCESS_REGISTRY_NAME, ARG_CHARTER, ARG_EXPIRE_HEIGHT, ARG_IDENTITY,
    ARG_INDEX, ARG_INSTANCE_ID, ARG_NAME, ARG_PROPOSED_TX, ARG_RECORD, ARG_SIGNATURE,
    CMD_CHARTER_EVOLVE, CMD_DEFERRED_ADD_PROOF, CMD_DEFERRED_EXECUTE, CMD_NAMING_BIND,
    CMD_REGISTRY_UPDATE, CONTRACT_CHARTER, CONTRACT_DEFERRED, CONTRACT_NAMING, CONTRACT_REGISTRY,
};
use concord_core::policy;
use concord_core::registry::{AccessGrants, CapabilitySet};

use crate::config::ClientConfig;

/// Governance client bound to one admin identity
pub struct AdminClient {
    ledger: Arc<dyn Ledger>,
    signer: Signer,
    genesis: Charter,
    signer_counter: u64,
    config: ClientConfig,
}

impl AdminClient {
    /// Client with a fresh random signing key
    pub async fn new(ledger: Arc<dyn Ledger>) -> Result<Self> {
        Self::with_signer(ledger, Signer::generate()).await
    }

    /// Client with explicit keys. Fetches and caches the genesis charter
    /// and initializes the replay counter from the ledger.
    pub async fn with_signer(ledger: Arc<dyn Ledger>, signer: Signer) -> Result<Self> {
        let genesis = ledger.genesis_charter().await?;
        let signer_counter = ledger.signer_counter(&signer.identity()).await?;
        Ok(Self { ledger, signer, genesis, signer_counter, config: ClientConfig::default() })
    }

    /// Override the default configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// This client's identity, read-only
    pub fn auth_identity(&self) -> Identity {
        self.signer.identity()
    }

    /// Refetch the authoritative replay counter. The recovery path after
    /// a replay rejection, when another submission from this identity won
    /// the race.
    pub async fn sync_counter(&mut self) -> Result<u64> {
        self.signer_counter = self.ledger.signer_counter(&self.auth_identity()).await?;
        Ok(self.signer_counter)
    }

    /// Spawn the governance charter with this client as sole voter.
    /// Bootstrap only: the submission is direct, gated by the genesis
    /// charter, not deferred.
    pub async fn spawn_governance_charter(&mut self) -> Result<CharterId> {
        let charter = Charter::new("governance charter guards project charters", &[self.auth_identity()])?;
        let instruction = Instruction::spawn(
            self.genesis.base_id.instance_id(),
            CONTRACT_CHARTER,
            vec![Argument::bytes(ARG_CHARTER, charter.encode()?)],
        );
        self.submit_signed(instruction).await?;
        info!(charter = %charter.base_id, "governance charter spawned");
        Ok(charter.base_id)
    }

    /// Propose adding `admin` to the voter set. Returns the proposal id
    /// the other admins sign.
    pub async fn add_admin(&mut self, charter_id: &CharterId, admin: &Identity) -> Result<InstanceId> {
        let charter = self.ledger.get_charter(charter_id).await?;
        let voters = charter.voters()?;
        let proposal = self
            .propose_evolution(&charter, &policy::append(&voters, admin.clone()))
            .await?;
        info!(charter = %charter_id, admin = %admin, proposal = %proposal, "admin addition proposed");
        Ok(proposal)
    }

    /// Propose removing `admin` from the voter set. Fails before any
    /// instruction is built when `admin` is not a current voter.
    pub async fn remove_admin(&mut self, charter_id: &CharterId, admin: &Identity) -> Result<InstanceId> {
        let charter = self.ledger.get_charter(charter_id).await?;
        let voters = charter.voters()?;
        let index = policy::index_of(admin, &voters)
            .ok_or_else(|| Error::not_found(format!("voter {admin} in charter {charter_id}")))?;
        let proposal = self.propose_evolution(&charter, &policy::remove_at(&voters, index)).await?;
        info!(charter = %charter_id, admin = %admin, proposal = %proposal, "admin removal proposed");
        Ok(proposal)
    }

    /// Propose replacing `old` with `new` in the voter set
    pub async fn rotate_admin_key(
        &mut self,
        charter_id: &CharterId,
        old: &Identity,
        new: &Identity,
    ) -> Result<InstanceId> {
        let charter = self.ledger.get_charter(charter_id).await?;
        let voters = charter.voters()?;
        let index = policy::index_of(old, &voters)
            .ok_or_else(|| Error::not_found(format!("voter {old} in charter {charter_id}")))?;
        let proposal = self
            .propose_evolution(&charter, &policy::replace_at(&voters, index, new.clone()))
            .await?;
        info!(charter = %charter_id, old = %old, new = %new, proposal = %proposal, "key rotation proposed");
        Ok(proposal)
    }

    /// Propose spawning a project charter described by `name` under the
    /// governance charter. Returns the proposal id and the project
    /// charter id, which is content-derived and known before execution.
    pub async fn create_project(
        &mut self,
        charter_id: &CharterId,
        name: &str,
    ) -> Result<(InstanceId, CharterId)> {
        let project = Charter::new(name, &[self.auth_identity()])?;
        let inner = Instruction::spawn(
            charter_id.instance_id(),
            CONTRACT_CHARTER,
            vec![Argument::bytes(ARG_CHARTER, project.encode()?)],
        );
        let proposal = self.propose_deferred(charter_id, Transaction::single(inner)).await?;
        info!(project = %project.base_id, proposal = %proposal, "project creation proposed");
        Ok((proposal, project.base_id))
    }

    /// Propose spawning an empty access-right registry under a project
    /// charter
    pub async fn create_access_registry(
        &mut self,
        charter_id: &CharterId,
        project: &CharterId,
    ) -> Result<InstanceId> {
        let inner = Instruction::spawn(
            project.instance_id(),
            CONTRACT_REGISTRY,
            vec![Argument::bytes(ARG_RECORD, AccessGrants::new().encode()?)],
        );
        let proposal = self.propose_deferred(charter_id, Transaction::single(inner)).await?;
        info!(project = %project, proposal = %proposal, "access registry proposed");
        Ok(proposal)
    }

    /// The registry instance an executed creation proposal spawned,
    /// derived from the inner spawn instruction
    pub async fn registry_instance_of(&self, proposal: &InstanceId) -> Result<InstanceId> {
        let view = self.ledger.get_deferred(proposal).await?;
        let inner = view
            .proposed
            .instructions
            .first()
            .ok_or_else(|| Error::validation(format!("proposal {proposal} has no instructions")))?;
        Ok(inner.derive_instance_id())
    }

    /// Bind an executed registry under the project's well-known name so
    /// later lookups resolve it without tracking raw instance ids
    pub async fn attach_access_registry(
        &mut self,
        project: &CharterId,
        registry: &InstanceId,
    ) -> Result<()> {
        let instruction = Instruction::invoke(
            InstanceId::NAMING,
            CONTRACT_NAMING,
            CMD_NAMING_BIND,
            vec![
                Argument::bytes(ARG_INSTANCE_ID, registry.as_bytes().to_vec()),
                Argument::bytes(ARG_NAME, ACCESS_REGISTRY_NAME.as_bytes().to_vec()),
            ],
        );
        self.submit_signed(instruction).await?;
        info!(project = %project, registry = %registry, "access registry attached");
        Ok(())
    }

    /// Propose granting capabilities to a querier with no entry yet
    pub async fn grant_querier(
        &mut self,
        charter_id: &CharterId,
        project: &CharterId,
        querier: &str,
        capabilities: CapabilitySet,
    ) -> Result<InstanceId> {
        let (registry, mut grants) = self.current_grants(project).await?;
        grants.grant(querier, capabilities)?;
        let proposal = self.propose_registry_update(charter_id, registry, &grants).await?;
        info!(project = %project, querier, proposal = %proposal, "querier grant proposed");
        Ok(proposal)
    }

    /// Propose removing a querier's entry. Revoking an absent querier is
    /// a no-op: the proposal still commits an unchanged record.
    pub async fn revoke_querier(
        &mut self,
        charter_id: &CharterId,
        project: &CharterId,
        querier: &str,
    ) -> Result<InstanceId> {
        let (registry, mut grants) = self.current_grants(project).await?;
        grants.revoke(querier);
        let proposal = self.propose_registry_update(charter_id, registry, &grants).await?;
        info!(project = %project, querier, proposal = %proposal, "querier revocation proposed");
        Ok(proposal)
    }

    /// Propose replacing an existing querier's capabilities
    pub async fn modify_querier(
        &mut self,
        charter_id: &CharterId,
        project: &CharterId,
        querier: &str,
        capabilities: CapabilitySet,
    ) -> Result<InstanceId> {
        let (registry, mut grants) = self.current_grants(project).await?;
        grants.modify(querier, capabilities)?;
        let proposal = self.propose_registry_update(charter_id, registry, &grants).await?;
        info!(project = %project, querier, proposal = %proposal, "querier modification proposed");
        Ok(proposal)
    }

    /// Ungated authorization check: whether `querier` holds `capability`
    /// as an exact token in the project's registry. An unknown querier is
    /// unauthorized and reported as not found.
    pub async fn verify_access(
        &self,
        project: &CharterId,
        querier: &str,
        capability: &str,
    ) -> Result<bool> {
        let (_, grants) = self.current_grants(project).await?;
        grants.allows(querier, capability)
    }

    /// Sign instruction 0 of a pending proposal with this client's key.
    /// Re-signing by an identity that already signed is accepted as a
    /// no-op and never counts as a second vote.
    pub async fn sign_proposal(&mut self, proposal: &InstanceId) -> Result<()> {
        self.sign_proposal_at(proposal, 0).await
    }

    /// Sign a specific instruction index of a pending proposal
    pub async fn sign_proposal_at(&mut self, proposal: &InstanceId, index: u32) -> Result<()> {
        let view = self.ledger.get_deferred(proposal).await?;
        let digest = *view.digest_at(index as usize)?;
        let signature = self.signer.sign(&digest);
        let instruction = Instruction::invoke(
            *proposal,
            CONTRACT_DEFERRED,
            CMD_DEFERRED_ADD_PROOF,
            vec![
                Argument::bytes(ARG_IDENTITY, self.auth_identity().as_str().as_bytes().to_vec()),
                Argument::bytes(ARG_SIGNATURE, signature.as_bytes().to_vec()),
                Argument::u32(ARG_INDEX, index),
            ],
        );
        self.submit_signed(instruction).await?;
        info!(proposal = %proposal, index, "proposal signed");
        Ok(())
    }

    /// Trigger execution of a pending proposal. Succeeds exactly once;
    /// an unsatisfied rule surfaces as a recoverable authorization error,
    /// expiry as a fatal one.
    pub async fn execute_proposal(&mut self, proposal: &InstanceId) -> Result<()> {
        let instruction =
            Instruction::invoke(*proposal, CONTRACT_DEFERRED, CMD_DEFERRED_EXECUTE, vec![]);
        self.submit_signed(instruction).await?;
        info!(proposal = %proposal, "proposal executed");
        Ok(())
    }

    async fn propose_evolution(
        &mut self,
        charter: &Charter,
        new_voters: &[Identity],
    ) -> Result<InstanceId> {
        let next = charter.evolve(new_voters)?;
        let inner = Instruction::invoke(
            charter.base_id.instance_id(),
            CONTRACT_CHARTER,
            CMD_CHARTER_EVOLVE,
            vec![Argument::bytes(ARG_CHARTER, next.encode()?)],
        );
        self.propose_deferred(&charter.base_id, Transaction::single(inner)).await
    }

    /// Wrap `proposed` in a deferred spawn under `charter_id` and submit
    /// it. Returns the derived proposal id.
    async fn propose_deferred(
        &mut self,
        charter_id: &CharterId,
        proposed: Transaction,
    ) -> Result<InstanceId> {
        let height = self.ledger.current_height().await?;
        let expire_height = height + self.config.expiry_offset;
        let instruction = Instruction::spawn(
            charter_id.instance_id(),
            CONTRACT_DEFERRED,
            vec![
                Argument::bytes(ARG_PROPOSED_TX, proposed.encode()?),
                Argument::u64(ARG_EXPIRE_HEIGHT, expire_height),
            ],
        );
        let (proposal, _) = self.submit_signed(instruction).await?;
        debug!(proposal = %proposal, expire_height, "deferred proposal spawned");
        Ok(proposal)
    }

    async fn propose_registry_update(
        &mut self,
        charter_id: &CharterId,
        registry: InstanceId,
        grants: &AccessGrants,
    ) -> Result<InstanceId> {
        let inner = Instruction::invoke(
            registry,
            CONTRACT_REGISTRY,
            CMD_REGISTRY_UPDATE,
            vec![Argument::bytes(ARG_RECORD, grants.encode()?)],
        );
        self.propose_deferred(charter_id, Transaction::single(inner)).await
    }

    async fn current_grants(&self, project: &CharterId) -> Result<(InstanceId, AccessGrants)> {
        let registry = self.ledger.resolve_name(project, ACCESS_REGISTRY_NAME).await?;
        let record = self.ledger.get_proof(&registry).await?;
        Ok((registry, AccessGrants::decode(&record)?))
    }

    /// The single submission path: stamp the next counter value, sign,
    /// submit, and move the counter exactly once on commit. A failed
    /// submission resynchronizes from the ledger because contract
    /// refusals burn the counter on-chain.
    async fn submit_signed(&mut self, instruction: Instruction) -> Result<(InstanceId, CommitMeta)> {
        let instruction = instruction.with_counter(self.signer_counter + 1);
        let derived = instruction.derive_instance_id();
        let mut tx = Transaction::single(instruction);
        tx.sign_with(&self.signer);

        match self.ledger.submit_and_wait(tx).await {
            Ok(meta) => {
                self.signer_counter += 1;
                Ok((derived, meta))
            }
            Err(e) => {
                if let Ok(counter) = self.ledger.signer_counter(&self.auth_identity()).await {
                    self.signer_counter = counter;
                }
                Err(e)
            }
        }
    }
}
