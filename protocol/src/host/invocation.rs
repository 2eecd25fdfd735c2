//! # Invocation: Buffered, All-or-Nothing Execution
//!
//! A [`ChainStub`] over a [`LedgerDB`] that never writes through. Every put,
//! delete, policy change, and event lands in a [`WriteSet`]; reads consult
//! the write set first so the contract sees its own writes. The caller then
//! either commits the whole set or drops the invocation, which discards it.
//!
//! ```text
//! let mut inv = Invocation::new(&db, tx_id, now);
//! let result = contract.invoke(&mut TxContext::new(&mut inv, &caller), ..);
//! if result.is_ok() { inv.commit()?; }   // else: dropped, nothing persisted
//! ```

use chrono::{DateTime, Utc};

use super::{ChainStub, ChaincodeEvent};
use crate::storage::{EndorsementPolicy, LedgerDB, StoreResult, WriteSet};

/// One pending invocation against a [`LedgerDB`].
#[derive(Debug)]
pub struct Invocation<'db> {
    db: &'db LedgerDB,
    tx_id: String,
    timestamp: DateTime<Utc>,
    writes: WriteSet,
}

impl<'db> Invocation<'db> {
    pub fn new(db: &'db LedgerDB, tx_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            db,
            tx_id: tx_id.into(),
            timestamp,
            writes: WriteSet::default(),
        }
    }

    /// The pending write set.
    pub fn write_set(&self) -> &WriteSet {
        &self.writes
    }

    /// The event that will be published if this invocation commits.
    pub fn event(&self) -> Option<&ChaincodeEvent> {
        self.writes.event.as_ref()
    }

    /// Persist the write set atomically. Consumes the invocation.
    pub fn commit(self) -> StoreResult<WriteSet> {
        self.db.commit(&self.tx_id, self.timestamp, &self.writes)?;
        tracing::info!(tx_id = %self.tx_id, keys = self.writes.state.len(), "invocation committed");
        Ok(self.writes)
    }
}

impl ChainStub for Invocation<'_> {
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.writes.state.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => self.db.get(key),
        }
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.writes.state.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn del_state(&mut self, key: &str) -> StoreResult<()> {
        self.writes.state.insert(key.to_string(), None);
        Ok(())
    }

    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> StoreResult<()> {
        self.writes.event = Some(ChaincodeEvent {
            name: name.to_string(),
            payload,
        });
        Ok(())
    }

    fn endorsement_policy(&self, key: &str) -> StoreResult<EndorsementPolicy> {
        match self.writes.endorsements.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => self.db.endorsement_policy(key),
        }
    }

    fn set_endorsement_policy(&mut self, key: &str, policy: EndorsementPolicy) -> StoreResult<()> {
        self.writes.endorsements.insert(key.to_string(), policy);
        Ok(())
    }
}
