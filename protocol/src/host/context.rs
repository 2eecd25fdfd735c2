//! # Transaction Context
//!
//! The handle every contract operation receives. It pairs the stub with the
//! caller identity and adds typed helpers on top of raw byte access, so the
//! contracts never hand-roll serialization.
//!
//! Ledger scalars and the order table use bincode; records that other
//! organizations read directly (auctions) and event payloads use JSON.

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ChainStub, ClientIdentity};
use crate::storage::{EndorsementPolicy, StoreError, StoreResult};

/// One invocation's view of the platform.
pub struct TxContext<'a> {
    stub: &'a mut dyn ChainStub,
    identity: &'a dyn ClientIdentity,
}

impl<'a> TxContext<'a> {
    pub fn new(stub: &'a mut dyn ChainStub, identity: &'a dyn ClientIdentity) -> Self {
        Self { stub, identity }
    }

    // -- Identity & clock ---------------------------------------------------

    /// Principal ID of the caller.
    pub fn caller_id(&self) -> &str {
        self.identity.id()
    }

    /// MSP ID of the caller's organization.
    pub fn caller_org(&self) -> &str {
        self.identity.msp_id()
    }

    pub fn tx_id(&self) -> &str {
        self.stub.tx_id()
    }

    /// Invocation timestamp. Use this, never the local clock, for anything
    /// that ends up in state: endorsing peers must compute the same result.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.stub.tx_timestamp()
    }

    // -- Raw state ----------------------------------------------------------

    pub fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.stub.get_state(key)
    }

    pub fn put_state(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.stub.put_state(key, value)
    }

    pub fn del_state(&mut self, key: &str) -> StoreResult<()> {
        self.stub.del_state(key)
    }

    // -- Typed state --------------------------------------------------------

    /// Read a bincode-encoded record. The bytes must decode to exactly one
    /// `T`; trailing bytes mean the key holds some other record.
    pub fn get_record<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.stub.get_state(key)? {
            Some(bytes) => record_codec()
                .deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Serialization(format!("{key:?}: {e}"))),
            None => Ok(None),
        }
    }

    /// Write a bincode-encoded record.
    pub fn put_record<T: Serialize>(&mut self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = bincode::serialize(value)
            .map_err(|e| StoreError::Serialization(format!("{key:?}: {e}")))?;
        self.stub.put_state(key, bytes)
    }

    /// Read a JSON-encoded record.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.stub.get_state(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Serialization(format!("{key:?}: {e}"))),
            None => Ok(None),
        }
    }

    /// Write a JSON-encoded record.
    pub fn put_json<T: Serialize>(&mut self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| StoreError::Serialization(format!("{key:?}: {e}")))?;
        self.stub.put_state(key, bytes)
    }

    // -- Events -------------------------------------------------------------

    /// Emit a JSON event. Replaces any event set earlier in this invocation.
    pub fn emit_event<T: Serialize>(&mut self, name: &str, payload: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| StoreError::Serialization(format!("event {name}: {e}")))?;
        self.stub.set_event(name, bytes)
    }

    // -- Endorsement --------------------------------------------------------

    /// Organizations currently required to endorse updates to `key`.
    pub fn endorsing_orgs(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self.stub.endorsement_policy(key)?.list_orgs())
    }

    /// Add organizations to the endorsement policy of `key`.
    /// Returns how many were not already present.
    pub fn add_endorsing_orgs(&mut self, key: &str, orgs: &[&str]) -> StoreResult<usize> {
        let mut policy = self.stub.endorsement_policy(key)?;
        let added = policy.add_orgs(orgs.iter().copied());
        if added > 0 {
            self.stub.set_endorsement_policy(key, policy)?;
        }
        Ok(added)
    }

    /// Replace the endorsement policy of `key` with exactly `orgs`.
    pub fn set_endorsing_orgs(&mut self, key: &str, orgs: &[&str]) -> StoreResult<()> {
        let mut policy = EndorsementPolicy::new();
        policy.add_orgs(orgs.iter().copied());
        self.stub.set_endorsement_policy(key, policy)
    }
}

/// Same wire format as `bincode::serialize`, minus the tolerance for
/// trailing input.
fn record_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}
