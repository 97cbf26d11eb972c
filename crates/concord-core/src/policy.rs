//! Boolean policy expressions
//!
//! A [`PolicyExpression`] gates a governed action: `And` requires every
//! listed identity's signature (unanimity), `Or` any one (any-of). This
//! system only ever produces flat, single-operator expressions over the
//! current voter list; the tree shape exists so evaluation and the
//! canonical text grammar stay honest about what they accept.
//!
//! Canonical textual encoding joins leaf identities with `" & "` or
//! `" | "`; a single-leaf expression prints as the bare identity. The
//! encoding round-trips byte-exact through [`PolicyExpression::parse`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::{Error, Result};
use crate::identity::Identity;

/// Boolean composition of identities gating a governed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyExpression {
    /// A single identity's signature
    Leaf(Identity),
    /// Every child must be satisfied (unanimity)
    And(Vec<PolicyExpression>),
    /// Any one child suffices (any-of)
    Or(Vec<PolicyExpression>),
}

impl PolicyExpression {
    /// Unanimity rule: every listed identity must sign.
    ///
    /// A single-identity list degenerates to a bare leaf, which is how the
    /// canonical encoding expects it.
    pub fn unanimous(identities: &[Identity]) -> Result<Self> {
        Self::flat(identities, true)
    }

    /// Any-of rule: one listed identity's signature suffices
    pub fn any_of(identities: &[Identity]) -> Result<Self> {
        Self::flat(identities, false)
    }

    fn flat(identities: &[Identity], unanimous: bool) -> Result<Self> {
        match identities {
            [] => Err(Error::validation("policy expression over empty identity list")),
            [single] => Ok(Self::Leaf(single.clone())),
            many => {
                let leaves = many.iter().cloned().map(Self::Leaf).collect();
                Ok(if unanimous { Self::And(leaves) } else { Self::Or(leaves) })
            }
        }
    }

    /// Ordered leaf identities of this expression
    pub fn identities(&self) -> Vec<Identity> {
        let mut out = Vec::new();
        self.collect_identities(&mut out);
        out
    }

    fn collect_identities(&self, out: &mut Vec<Identity>) {
        match self {
            Self::Leaf(id) => out.push(id.clone()),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_identities(out);
                }
            }
        }
    }

    /// Parse the canonical textual encoding.
    ///
    /// Splits on the single operator present, trims each element. Fails
    /// with a validation error on empty input or mixed operators.
    pub fn parse(text: &str) -> Result<Self> {
        let has_and = text.contains('&');
        let has_or = text.contains('|');
        if has_and && has_or {
            return Err(Error::validation(format!("mixed-operator expression: {text}")));
        }
        if text.trim().is_empty() {
            return Err(Error::validation("empty policy expression"));
        }

        let parts: Vec<&str> = if has_and {
            text.split('&').collect()
        } else if has_or {
            text.split('|').collect()
        } else {
            vec![text]
        };

        let mut identities = Vec::with_capacity(parts.len());
        for part in parts {
            identities.push(Identity::parse(part.trim())?);
        }

        if has_and {
            Self::unanimous(&identities)
        } else if has_or {
            Self::any_of(&identities)
        } else {
            Ok(Self::Leaf(identities.remove(0)))
        }
    }

    /// Evaluate against a set of verified signer identities
    pub fn is_satisfied_by(&self, signers: &BTreeSet<Identity>) -> bool {
        match self {
            Self::Leaf(id) => signers.contains(id),
            Self::And(children) => children.iter().all(|c| c.is_satisfied_by(signers)),
            Self::Or(children) => children.iter().any(|c| c.is_satisfied_by(signers)),
        }
    }
}

impl fmt::Display for PolicyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(id) => f.write_str(id.as_str()),
            Self::And(children) => join(f, children, " & "),
            Self::Or(children) => join(f, children, " | "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, children: &[PolicyExpression], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}

/// First position of `identity` in `list`, exact string match
pub fn index_of(identity: &Identity, list: &[Identity]) -> Option<usize> {
    list.iter().position(|id| id == identity)
}

/// Copy of `list` with `identity` appended. Duplicates are a caller error
/// and are not rejected here.
pub fn append(list: &[Identity], identity: Identity) -> Vec<Identity> {
    let mut out = list.to_vec();
    out.push(identity);
    out
}

/// Copy of `list` with the element at `index` removed
pub fn remove_at(list: &[Identity], index: usize) -> Vec<Identity> {
    let mut out = list.to_vec();
    out.remove(index);
    out
}

/// Copy of `list` with the element at `index` replaced
pub fn replace_at(list: &[Identity], index: usize, identity: Identity) -> Vec<Identity> {
    let mut out = list.to_vec();
    out[index] = identity;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Signer;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn ids(n: u8) -> Vec<Identity> {
        (0..n).map(|i| Signer::from_seed([i + 1; 32]).identity()).collect()
    }

    #[test]
    fn unanimous_and_any_of_round_trip_through_text() {
        let voters = ids(3);
        let and = PolicyExpression::unanimous(&voters).unwrap();
        let or = PolicyExpression::any_of(&voters).unwrap();

        assert_eq!(PolicyExpression::parse(&and.to_string()).unwrap(), and);
        assert_eq!(PolicyExpression::parse(&or.to_string()).unwrap(), or);
        assert_eq!(and.identities(), voters);
        assert_eq!(or.identities(), voters);
    }

    #[test]
    fn single_voter_degenerates_to_a_bare_leaf() {
        let voters = ids(1);
        let and = PolicyExpression::unanimous(&voters).unwrap();
        assert_eq!(and, PolicyExpression::Leaf(voters[0].clone()));
        assert_eq!(and.to_string(), voters[0].as_str());
    }

    #[test]
    fn parse_rejects_empty_and_mixed_operators() {
        assert_matches!(PolicyExpression::parse(""), Err(Error::Validation { .. }));
        assert_matches!(PolicyExpression::parse("   "), Err(Error::Validation { .. }));
        let voters = ids(3);
        let mixed = format!("{} & {} | {}", voters[0], voters[1], voters[2]);
        assert_matches!(PolicyExpression::parse(&mixed), Err(Error::Validation { .. }));
    }

    #[test]
    fn empty_voter_list_is_rejected() {
        assert_matches!(PolicyExpression::unanimous(&[]), Err(Error::Validation { .. }));
        assert_matches!(PolicyExpression::any_of(&[]), Err(Error::Validation { .. }));
    }

    #[test]
    fn satisfaction_matches_unanimity_and_any_of_semantics() {
        let voters = ids(3);
        let and = PolicyExpression::unanimous(&voters).unwrap();
        let or = PolicyExpression::any_of(&voters).unwrap();

        let one: BTreeSet<_> = voters[..1].iter().cloned().collect();
        let all: BTreeSet<_> = voters.iter().cloned().collect();
        let none = BTreeSet::new();

        assert!(!and.is_satisfied_by(&one));
        assert!(and.is_satisfied_by(&all));
        assert!(or.is_satisfied_by(&one));
        assert!(!or.is_satisfied_by(&none));
    }

    #[test]
    fn list_operators_are_pure() {
        let voters = ids(2);
        let extra = Signer::from_seed([9; 32]).identity();

        assert_eq!(index_of(&voters[1], &voters), Some(1));
        assert_eq!(index_of(&extra, &voters), None);

        let appended = append(&voters, extra.clone());
        assert_eq!(appended.len(), 3);
        assert_eq!(voters.len(), 2);

        let removed = remove_at(&appended, 0);
        assert_eq!(removed, vec![voters[1].clone(), extra.clone()]);

        let replaced = replace_at(&voters, 0, extra.clone());
        assert_eq!(replaced, vec![extra, voters[1].clone()]);
    }

    proptest! {
        #[test]
        fn round_trip_over_arbitrary_voter_lists(seeds in prop::collection::vec(any::<[u8; 32]>(), 1..8)) {
            let voters: Vec<Identity> =
                seeds.iter().map(|s| Signer::from_seed(*s).identity()).collect();

            let and = PolicyExpression::unanimous(&voters).unwrap();
            let parsed = PolicyExpression::parse(&and.to_string()).unwrap();
            prop_assert_eq!(parsed.identities(), voters.clone());

            let or = PolicyExpression::any_of(&voters).unwrap();
            let parsed = PolicyExpression::parse(&or.to_string()).unwrap();
            prop_assert_eq!(parsed.identities(), voters);
        }
    }
}
