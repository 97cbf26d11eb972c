//! Versioned policy charters
//!
//! A [`Charter`] is the versioned, content-addressed document holding one
//! policy rule per governed action. Its id is the content hash of version
//! 0 and never changes across evolutions; each evolution produces
//! `version + 1` with a rule table rebuilt from the new voter list. The
//! ledger accepts an evolution only when the executing signer set
//! satisfies the *previous* version's evolve rule, so changing who gets
//! to vote is always gated by the old voters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::action::{GovernedAction, PolicyKind};
use crate::errors::{Error, Result};
use crate::hash::Hasher;
use crate::identity::Identity;
use crate::instruction::InstanceId;
use crate::policy::PolicyExpression;

/// Stable identity of a charter across all its versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharterId(pub [u8; 32]);

impl CharterId {
    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The ledger instance a charter occupies
    pub fn instance_id(&self) -> InstanceId {
        InstanceId(self.0)
    }
}

impl fmt::Display for CharterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Versioned set of named authorization rules over a voter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charter {
    /// Content hash of version 0, stable across evolutions
    pub base_id: CharterId,
    /// Monotonic version, starts at 0
    pub version: u64,
    /// Human-readable purpose of this charter
    pub description: String,
    /// One rule per governed action
    pub rules: BTreeMap<GovernedAction, PolicyExpression>,
}

impl Charter {
    /// Version-0 charter over `voters`, id derived from its content
    pub fn new(description: &str, voters: &[Identity]) -> Result<Self> {
        let rules = Self::rules_for(voters)?;
        let base_id = content_id(description, &rules);
        Ok(Self { base_id, version: 0, description: description.to_string(), rules })
    }

    /// Full rule table for a voter list: unanimous expressions for
    /// structural changes, any-of for protocol steps
    pub fn rules_for(voters: &[Identity]) -> Result<BTreeMap<GovernedAction, PolicyExpression>> {
        let unanimous = PolicyExpression::unanimous(voters)?;
        let any_of = PolicyExpression::any_of(voters)?;
        let mut rules = BTreeMap::new();
        for action in GovernedAction::ALL {
            let expr = match action.policy_kind() {
                PolicyKind::Unanimous => unanimous.clone(),
                PolicyKind::AnyOf => any_of.clone(),
            };
            rules.insert(action, expr);
        }
        Ok(rules)
    }

    /// The rule gating `action`
    pub fn rule(&self, action: GovernedAction) -> Result<&PolicyExpression> {
        self.rules
            .get(&action)
            .ok_or_else(|| Error::not_found(format!("rule {action} in charter {}", self.base_id)))
    }

    /// Current voter list, read off the evolve rule's leaves
    pub fn voters(&self) -> Result<Vec<Identity>> {
        Ok(self.rule(GovernedAction::EvolveCharter)?.identities())
    }

    /// Next version over a changed voter list: same `base_id`,
    /// `version + 1`, rules rebuilt in full
    pub fn evolve(&self, new_voters: &[Identity]) -> Result<Self> {
        Ok(Self {
            base_id: self.base_id,
            version: self.version + 1,
            description: self.description.clone(),
            rules: Self::rules_for(new_voters)?,
        })
    }

    /// Canonical binary encoding at the ledger boundary
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::encoding(format!("charter: {e}")))
    }

    /// Decode the canonical binary encoding
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::encoding(format!("charter: {e}")))
    }
}

/// Content hash of a version-0 charter: description plus every rule in
/// `BTreeMap` order, rendered in the canonical text grammar
fn content_id(description: &str, rules: &BTreeMap<GovernedAction, PolicyExpression>) -> CharterId {
    let mut h = Hasher::new();
    h.field(b"charter");
    h.field(description.as_bytes());
    for (action, expr) in rules {
        h.field(action.name().as_bytes());
        h.field(expr.to_string().as_bytes());
    }
    CharterId(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Signer;

    fn voters(n: u8) -> Vec<Identity> {
        (0..n).map(|i| Signer::from_seed([i + 10; 32]).identity()).collect()
    }

    #[test]
    fn every_governed_action_has_a_rule() {
        let charter = Charter::new("admins", &voters(2)).unwrap();
        for action in GovernedAction::ALL {
            charter.rule(action).unwrap();
        }
    }

    #[test]
    fn evolution_keeps_base_id_and_bumps_version() {
        let charter = Charter::new("admins", &voters(2)).unwrap();
        let grown = charter.evolve(&voters(3)).unwrap();

        assert_eq!(grown.base_id, charter.base_id);
        assert_eq!(grown.version, 1);
        assert_eq!(grown.voters().unwrap(), voters(3));

        let again = grown.evolve(&voters(2)).unwrap();
        assert_eq!(again.version, 2);
        assert_eq!(again.base_id, charter.base_id);
    }

    #[test]
    fn charter_ids_are_content_addressed() {
        let a = Charter::new("admins", &voters(2)).unwrap();
        let b = Charter::new("admins", &voters(2)).unwrap();
        let c = Charter::new("project x", &voters(2)).unwrap();

        assert_eq!(a.base_id, b.base_id);
        assert_ne!(a.base_id, c.base_id);
    }

    #[test]
    fn rule_kinds_follow_the_action_table() {
        let ids = voters(3);
        let charter = Charter::new("admins", &ids).unwrap();
        let evolve = charter.rule(GovernedAction::EvolveCharter).unwrap();
        let propose = charter.rule(GovernedAction::ProposeDeferred).unwrap();

        assert!(matches!(evolve, PolicyExpression::And(_)));
        assert!(matches!(propose, PolicyExpression::Or(_)));
        assert_eq!(evolve.identities(), ids);
        assert_eq!(propose.identities(), ids);
    }

    #[test]
    fn encoding_round_trips() {
        let charter = Charter::new("admins", &voters(2)).unwrap();
        let decoded = Charter::decode(&charter.encode().unwrap()).unwrap();
        assert_eq!(decoded, charter);
    }
}
