//! # Host Platform Interface
//!
//! Everything the contracts need from the peer that executes them, reduced
//! to two traits:
//!
//! - [`ChainStub`]: world-state reads and writes, the invocation's tx ID
//!   and timestamp, event emission, and per-key endorsement policies.
//! - [`ClientIdentity`]: who is calling and which organization vouches
//!   for them.
//!
//! Contract code only ever sees a [`TxContext`] that borrows one of each.
//! Two stubs ship with this crate: [`Invocation`] (buffered, committed to a
//! [`LedgerDB`](crate::storage::LedgerDB) on success) and [`MockStub`]
//! (in-memory, writes visible immediately, for tests).

pub mod context;
pub mod invocation;
pub mod mock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{EndorsementPolicy, StoreResult};

pub use context::TxContext;
pub use invocation::Invocation;
pub use mock::MockStub;

/// A named notification with an opaque payload, delivered to observers
/// once the invocation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeEvent {
    pub name: String,
    pub payload: Vec<u8>,
}

/// World-state and platform services available to one invocation.
pub trait ChainStub {
    /// Read a key. Absent keys are `Ok(None)`, never an error.
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a key.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Delete a key. Deleting an absent key is not an error.
    fn del_state(&mut self, key: &str) -> StoreResult<()>;

    /// Identifier of the current invocation.
    fn tx_id(&self) -> &str;

    /// Timestamp the client attached to the invocation.
    fn tx_timestamp(&self) -> DateTime<Utc>;

    /// Set the invocation's event. Only one event survives per invocation;
    /// a later call replaces an earlier one.
    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> StoreResult<()>;

    /// Endorsement policy attached to `key` (empty if none).
    fn endorsement_policy(&self, key: &str) -> StoreResult<EndorsementPolicy>;

    /// Replace the endorsement policy attached to `key`.
    fn set_endorsement_policy(&mut self, key: &str, policy: EndorsementPolicy) -> StoreResult<()>;
}

/// The authenticated caller of an invocation.
pub trait ClientIdentity {
    /// Unique principal ID (the ledger account name).
    fn id(&self) -> &str;

    /// MSP ID of the caller's organization.
    fn msp_id(&self) -> &str;
}

/// A caller whose identity was already verified by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub msp_id: String,
}

impl Caller {
    pub fn new(id: impl Into<String>, msp_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            msp_id: msp_id.into(),
        }
    }
}

impl ClientIdentity for Caller {
    fn id(&self) -> &str {
        &self.id
    }

    fn msp_id(&self) -> &str {
        &self.msp_id
    }
}
