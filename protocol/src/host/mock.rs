//! # MockStub: In-Memory Host for Tests
//!
//! Writes apply immediately and nothing is ever rolled back, so tests can
//! observe every side effect an operation had, including the best-effort
//! cleanup some operations perform right before they fail. Unlike a real
//! peer it keeps every event ever set, in order.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::{ChainStub, ChaincodeEvent};
use crate::storage::{EndorsementPolicy, StoreResult};

/// A fake peer: world state in a `BTreeMap`, a settable clock, and a
/// counter-based tx ID.
#[derive(Debug, Clone)]
pub struct MockStub {
    state: BTreeMap<String, Vec<u8>>,
    policies: HashMap<String, EndorsementPolicy>,
    events: Vec<ChaincodeEvent>,
    tx_seq: u64,
    tx_id: String,
    now: DateTime<Utc>,
}

impl Default for MockStub {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStub {
    /// Fresh stub with the clock at 2024-01-01T00:00:00Z and tx ID `tx-1`.
    pub fn new() -> Self {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
        Self {
            state: BTreeMap::new(),
            policies: HashMap::new(),
            events: Vec::new(),
            tx_seq: 1,
            tx_id: "tx-1".to_string(),
            now,
        }
    }

    /// Start a new "invocation": bumps the tx ID. State is kept.
    pub fn next_tx(&mut self) -> &mut Self {
        self.tx_seq += 1;
        self.tx_id = format!("tx-{}", self.tx_seq);
        self
    }

    /// Move the clock forward.
    pub fn advance(&mut self, by: Duration) -> &mut Self {
        self.now += by;
        self
    }

    /// Pin the clock to an exact instant.
    pub fn set_time(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.now = now;
        self
    }

    /// Every event set so far, oldest first.
    pub fn events(&self) -> &[ChaincodeEvent] {
        &self.events
    }

    pub fn last_event(&self) -> Option<&ChaincodeEvent> {
        self.events.last()
    }

    /// Raw view of the world state, for assertions.
    pub fn state(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.state
    }
}

impl ChainStub for MockStub {
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.state.get(key).cloned())
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.state.insert(key.to_string(), value);
        Ok(())
    }

    fn del_state(&mut self, key: &str) -> StoreResult<()> {
        self.state.remove(key);
        Ok(())
    }

    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> DateTime<Utc> {
        self.now
    }

    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> StoreResult<()> {
        self.events.push(ChaincodeEvent {
            name: name.to_string(),
            payload,
        });
        Ok(())
    }

    fn endorsement_policy(&self, key: &str) -> StoreResult<EndorsementPolicy> {
        Ok(self.policies.get(key).cloned().unwrap_or_default())
    }

    fn set_endorsement_policy(&mut self, key: &str, policy: EndorsementPolicy) -> StoreResult<()> {
        self.policies.insert(key.to_string(), policy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_tx_changes_id_but_keeps_state() {
        let mut stub = MockStub::new();
        stub.put_state("k", b"v".to_vec()).unwrap();
        let first = stub.tx_id().to_string();
        stub.next_tx();
        assert_ne!(stub.tx_id(), first);
        assert_eq!(stub.get_state("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn clock_advances() {
        let mut stub = MockStub::new();
        let start = stub.tx_timestamp();
        stub.advance(Duration::minutes(5));
        assert_eq!(stub.tx_timestamp() - start, Duration::minutes(5));
    }

    #[test]
    fn events_accumulate() {
        let mut stub = MockStub::new();
        stub.set_event("Approval", vec![1]).unwrap();
        stub.set_event("Transfer", vec![2]).unwrap();
        assert_eq!(stub.events().len(), 2);
        assert_eq!(stub.last_event().unwrap().name, "Transfer");
    }
}
