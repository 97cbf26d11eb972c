//! Governed actions and their policy kinds
//!
//! Every sensitive ledger operation maps to a [`GovernedAction`], and every
//! action has a fixed [`PolicyKind`]: committing a structural change
//! (evolving a charter, spawning instances, updating a registry) is
//! unanimous over the current voters, while moving the deferred protocol
//! forward (proposing, countersigning, triggering execution, binding a
//! name) is open to any single voter. The mapping is a total match, so a
//! new action cannot be added without deciding its kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ledger operation gated by a charter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GovernedAction {
    /// Install the next version of a charter
    EvolveCharter,
    /// Spawn a new charter under this one
    SpawnCharter,
    /// Spawn an access-right registry
    SpawnRegistry,
    /// Replace an access-right registry's record
    UpdateRegistry,
    /// Spawn a deferred proposal
    ProposeDeferred,
    /// Add a signature to a pending proposal
    Countersign,
    /// Trigger execution of a pending proposal
    ExecuteDeferred,
    /// Bind a human-readable name to an instance
    BindName,
}

/// Which expression shape gates an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Every current voter must have signed
    Unanimous,
    /// Any one current voter suffices
    AnyOf,
}

impl GovernedAction {
    /// All governed actions, the full rule table of a charter
    pub const ALL: [GovernedAction; 8] = [
        GovernedAction::EvolveCharter,
        GovernedAction::SpawnCharter,
        GovernedAction::SpawnRegistry,
        GovernedAction::UpdateRegistry,
        GovernedAction::ProposeDeferred,
        GovernedAction::Countersign,
        GovernedAction::ExecuteDeferred,
        GovernedAction::BindName,
    ];

    /// The policy kind gating this action
    pub fn policy_kind(self) -> PolicyKind {
        match self {
            Self::EvolveCharter | Self::SpawnCharter | Self::SpawnRegistry | Self::UpdateRegistry => {
                PolicyKind::Unanimous
            }
            Self::ProposeDeferred | Self::Countersign | Self::ExecuteDeferred | Self::BindName => {
                PolicyKind::AnyOf
            }
        }
    }

    /// Stable rule name used in logs and error context
    pub fn name(self) -> &'static str {
        match self {
            Self::EvolveCharter => "charter.evolve",
            Self::SpawnCharter => "charter.spawn",
            Self::SpawnRegistry => "registry.spawn",
            Self::UpdateRegistry => "registry.update",
            Self::ProposeDeferred => "deferred.propose",
            Self::Countersign => "deferred.countersign",
            Self::ExecuteDeferred => "deferred.execute",
            Self::BindName => "naming.bind",
        }
    }
}

impl fmt::Display for GovernedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_changes_are_unanimous_and_protocol_steps_are_any_of() {
        for action in GovernedAction::ALL {
            let expected = match action {
                GovernedAction::EvolveCharter
                | GovernedAction::SpawnCharter
                | GovernedAction::SpawnRegistry
                | GovernedAction::UpdateRegistry => PolicyKind::Unanimous,
                _ => PolicyKind::AnyOf,
            };
            assert_eq!(action.policy_kind(), expected, "{action}");
        }
    }

    #[test]
    fn rule_names_are_unique() {
        let mut names: Vec<_> = GovernedAction::ALL.iter().map(|a| a.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), GovernedAction::ALL.len());
    }
}
