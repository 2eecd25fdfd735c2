//! # State-Based Endorsement Policies
//!
//! A record can carry its own endorsement policy: the set of organizations
//! whose peers must co-sign any future update to that key. Auctions use this
//! so that every organization with a bidder in the auction has to agree on
//! the auction's next state.
//!
//! The policy is stored as a sorted, de-duplicated set of MSP IDs. Sorting
//! keeps the encoded bytes deterministic across endorsing peers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{StoreError, StoreResult};

/// The organizations required to endorse updates to one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementPolicy {
    orgs: BTreeSet<String>,
}

impl EndorsementPolicy {
    /// Create an empty policy (the channel-level default applies).
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a policy previously produced by [`to_bytes`](Self::to_bytes).
    /// An empty byte slice is the empty policy.
    pub fn from_bytes(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Encode the policy for storage.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Add organizations to the policy. Returns the number actually added.
    pub fn add_orgs<I, S>(&mut self, orgs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for org in orgs {
            if self.orgs.insert(org.into()) {
                added += 1;
            }
        }
        added
    }

    /// Remove organizations from the policy. Returns the number removed.
    pub fn del_orgs<I, S>(&mut self, orgs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for org in orgs {
            if self.orgs.remove(org.as_ref()) {
                removed += 1;
            }
        }
        removed
    }

    /// The organizations in the policy, sorted.
    pub fn list_orgs(&self) -> Vec<String> {
        self.orgs.iter().cloned().collect()
    }

    /// Returns `true` if `org` must endorse updates.
    pub fn contains(&self, org: &str) -> bool {
        self.orgs.contains(org)
    }

    /// Returns `true` if no organization is named.
    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty()
    }
}
