//! Access-grant records
//!
//! Per-project mapping from external querier identifier to the set of
//! capability tokens that querier may exercise. A querier key exists at
//! most once; capability membership is whole-token comparison, never
//! substring containment. The record is created empty at project
//! creation, mutated only through gated deferred transactions, and read
//! directly (ungated) for authorization checks.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{Error, Result};

/// Set of whole capability tokens granted to one querier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    /// Build from any collection of tokens
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Exact-token membership
    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains(capability)
    }

    /// Canonical comma-joined form, lexicographic token order
    pub fn join(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// Parse the comma-joined form; empty input is the empty set
    pub fn split(joined: &str) -> Self {
        if joined.is_empty() {
            return Self::default();
        }
        Self(joined.split(',').map(str::to_string).collect())
    }
}

/// Per-project record of querier capability grants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrants {
    /// Querier identifier to granted capabilities, lexicographic order
    pub grants: BTreeMap<String, CapabilitySet>,
}

impl AccessGrants {
    /// The empty record a project starts with
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `capabilities` to a querier that has no entry yet
    pub fn grant(&mut self, querier: &str, capabilities: CapabilitySet) -> Result<()> {
        if self.grants.contains_key(querier) {
            return Err(Error::already_exists(format!("querier {querier}")));
        }
        self.grants.insert(querier.to_string(), capabilities);
        Ok(())
    }

    /// Remove a querier's entry. Removing an absent querier is a no-op.
    pub fn revoke(&mut self, querier: &str) {
        self.grants.remove(querier);
    }

    /// Replace an existing querier's capabilities
    pub fn modify(&mut self, querier: &str, capabilities: CapabilitySet) -> Result<()> {
        match self.grants.get_mut(querier) {
            Some(existing) => {
                *existing = capabilities;
                Ok(())
            }
            None => Err(Error::not_found(format!("querier {querier}"))),
        }
    }

    /// Whether `querier` holds `capability` as an exact token. An unknown
    /// querier is unauthorized and reported as not found.
    pub fn allows(&self, querier: &str, capability: &str) -> Result<bool> {
        let caps = self
            .grants
            .get(querier)
            .ok_or_else(|| Error::not_found(format!("querier {querier}")))?;
        Ok(caps.contains(capability))
    }

    /// Canonical binary encoding: querier to comma-joined tokens, in
    /// lexicographic querier order, so the bytes are stable across
    /// implementations
    pub fn encode(&self) -> Result<Vec<u8>> {
        let flat: BTreeMap<&str, String> =
            self.grants.iter().map(|(q, caps)| (q.as_str(), caps.join())).collect();
        bincode::serialize(&flat).map_err(|e| Error::encoding(format!("access grants: {e}")))
    }

    /// Decode the canonical binary encoding
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let flat: BTreeMap<String, String> =
            bincode::deserialize(bytes).map_err(|e| Error::encoding(format!("access grants: {e}")))?;
        let grants = flat
            .into_iter()
            .map(|(q, joined)| (q, CapabilitySet::split(&joined)))
            .collect();
        Ok(Self { grants })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn caps(tokens: &[&str]) -> CapabilitySet {
        CapabilitySet::from_tokens(tokens.iter().copied())
    }

    #[test]
    fn grant_rejects_duplicates_and_modify_requires_presence() {
        let mut grants = AccessGrants::new();
        grants.grant("1:1", caps(&["count_global"])).unwrap();

        assert_matches!(
            grants.grant("1:1", caps(&["count_global"])),
            Err(Error::AlreadyExists { .. })
        );
        assert_matches!(grants.modify("2:1", caps(&[])), Err(Error::NotFound { .. }));

        grants.modify("1:1", caps(&["count_per_site_shuffled"])).unwrap();
        assert!(grants.allows("1:1", "count_per_site_shuffled").unwrap());
        assert!(!grants.allows("1:1", "count_global").unwrap());
    }

    #[test]
    fn revoke_of_absent_querier_is_a_no_op() {
        let mut grants = AccessGrants::new();
        grants.revoke("ghost");

        grants.grant("1:1", caps(&["count_global"])).unwrap();
        grants.revoke("1:1");
        assert_matches!(grants.allows("1:1", "count_global"), Err(Error::NotFound { .. }));
    }

    #[test]
    fn capability_comparison_is_whole_token_not_substring() {
        let mut grants = AccessGrants::new();
        grants.grant("1:1", caps(&["count_per_site_shuffled"])).unwrap();

        assert!(grants.allows("1:1", "count_per_site_shuffled").unwrap());
        assert!(!grants.allows("1:1", "count_per_site").unwrap());
        assert!(!grants.allows("1:1", "count").unwrap());
    }

    #[test]
    fn encoding_is_byte_stable_regardless_of_insertion_order() {
        let mut a = AccessGrants::new();
        a.grant("2:1", caps(&["count_global"])).unwrap();
        a.grant("1:1", caps(&["count_global", "count_per_site_shuffled"])).unwrap();

        let mut b = AccessGrants::new();
        b.grant("1:1", caps(&["count_per_site_shuffled", "count_global"])).unwrap();
        b.grant("2:1", caps(&["count_global"])).unwrap();

        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
        assert_eq!(AccessGrants::decode(&a.encode().unwrap()).unwrap(), a);
    }

    #[test]
    fn empty_capability_set_round_trips() {
        let mut grants = AccessGrants::new();
        grants.grant("1:1", CapabilitySet::default()).unwrap();
        let decoded = AccessGrants::decode(&grants.encode().unwrap()).unwrap();
        assert_eq!(decoded, grants);
        assert!(!decoded.allows("1:1", "anything").unwrap());
    }
}
