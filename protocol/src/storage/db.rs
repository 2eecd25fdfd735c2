//! # LedgerDB: Persistent World State
//!
//! The persistence layer behind the node, built on sled's embedded
//! key-value store. Contracts never see this type; they see an
//! [`Invocation`](crate::host::Invocation) that buffers their writes and
//! hands the finished [`WriteSet`] to [`LedgerDB::commit`].
//!
//! ## Atomicity
//!
//! A commit touches four trees (world state, endorsement policies, the event
//! log, and the committed-transaction index). All four are updated inside a
//! single sled multi-tree transaction: either every write of the invocation
//! lands or none does. A transaction ID that was already committed aborts the
//! whole commit, so replaying an invocation cannot apply it twice.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};

use super::endorsement::EndorsementPolicy;
use super::{StoreError, StoreResult};
use crate::host::ChaincodeEvent;

/// Well-known key in the `metadata` tree for the on-disk layout version.
const META_SCHEMA_VERSION: &[u8] = b"schema_version";

/// Current on-disk layout version.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// WriteSet
// ---------------------------------------------------------------------------

/// Everything one invocation wants to change.
///
/// `state` maps a key to its new value, or to `None` for a delete. Only the
/// last write to a key survives, matching the read-your-writes view the
/// invocation had while it ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    pub state: BTreeMap<String, Option<Vec<u8>>>,
    pub endorsements: BTreeMap<String, EndorsementPolicy>,
    pub event: Option<ChaincodeEvent>,
}

impl WriteSet {
    /// Returns `true` if committing would change nothing but the tx index.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.endorsements.is_empty() && self.event.is_none()
    }
}

/// An event as persisted in the log, tagged with the transaction that set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Position in the log. Monotonic, not necessarily contiguous.
    pub sequence: u64,
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ChaincodeEvent,
}

// ---------------------------------------------------------------------------
// LedgerDB
// ---------------------------------------------------------------------------

/// sled-backed world state for a single channel.
///
/// Cheap to clone; all clones share the same underlying database.
#[derive(Debug, Clone)]
pub struct LedgerDB {
    db: Db,
    /// Contract records keyed by their plain or composite key.
    world_state: Tree,
    /// Per-key endorsement policies.
    endorsements: Tree,
    /// Emitted events, keyed by big-endian sequence number.
    events: Tree,
    /// Committed transaction IDs.
    transactions: Tree,
    /// Layout version and other bookkeeping.
    metadata: Tree,
}

impl LedgerDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a throwaway database that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let world_state = db.open_tree("world_state")?;
        let endorsements = db.open_tree("endorsements")?;
        let events = db.open_tree("events")?;
        let transactions = db.open_tree("transactions")?;
        let metadata = db.open_tree("metadata")?;

        match metadata.get(META_SCHEMA_VERSION)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_ref().try_into().map_err(|_| {
                    StoreError::Serialization("invalid schema version bytes".to_string())
                })?;
                let version = u32::from_be_bytes(raw);
                if version != SCHEMA_VERSION {
                    return Err(StoreError::Unavailable(format!(
                        "unsupported schema version {version}, expected {SCHEMA_VERSION}"
                    )));
                }
            }
            None => {
                metadata.insert(META_SCHEMA_VERSION, &SCHEMA_VERSION.to_be_bytes())?;
            }
        }

        Ok(Self {
            db,
            world_state,
            endorsements,
            events,
            transactions,
            metadata,
        })
    }

    // -- Reads --------------------------------------------------------------

    /// Read the committed value of a world-state key.
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.world_state.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    /// Read the committed endorsement policy of a key (empty if none).
    pub fn endorsement_policy(&self, key: &str) -> StoreResult<EndorsementPolicy> {
        match self.endorsements.get(key.as_bytes())? {
            Some(bytes) => EndorsementPolicy::from_bytes(&bytes),
            None => Ok(EndorsementPolicy::new()),
        }
    }

    /// All committed world-state entries whose key starts with `prefix`.
    pub fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let mut entries = Vec::new();
        for result in self.world_state.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
            entries.push((key, value.to_vec()));
        }
        Ok(entries)
    }

    /// The most recent `limit` events, oldest first.
    pub fn event_log(&self, limit: usize) -> StoreResult<Vec<LoggedEvent>> {
        let mut events = Vec::with_capacity(limit.min(64));
        for result in self.events.iter().rev().take(limit) {
            let (_seq, bytes) = result?;
            events.push(decode_event(&bytes)?);
        }
        events.reverse();
        Ok(events)
    }

    /// Events committed by one transaction.
    pub fn events_for(&self, tx_id: &str) -> StoreResult<Vec<LoggedEvent>> {
        let mut events = Vec::new();
        for result in self.events.iter() {
            let (_seq, bytes) = result?;
            let event = decode_event(&bytes)?;
            if event.tx_id == tx_id {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Returns `true` if `tx_id` has already been committed.
    pub fn is_committed(&self, tx_id: &str) -> StoreResult<bool> {
        Ok(self.transactions.contains_key(tx_id.as_bytes())?)
    }

    /// Number of committed transactions.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Number of live world-state records.
    pub fn state_len(&self) -> usize {
        self.world_state.len()
    }

    // -- Commit -------------------------------------------------------------

    /// Apply one invocation's write set atomically and record its tx ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTx`] if `tx_id` was committed before;
    /// nothing is written in that case.
    pub fn commit(&self, tx_id: &str, timestamp: DateTime<Utc>, writes: &WriteSet) -> StoreResult<()> {
        let event_bytes = match &writes.event {
            Some(event) => {
                let logged = LoggedEvent {
                    sequence: self.db.generate_id()?,
                    tx_id: tx_id.to_string(),
                    timestamp,
                    event: event.clone(),
                };
                let bytes = bincode::serialize(&logged)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Some((logged.sequence.to_be_bytes().to_vec(), bytes))
            }
            None => None,
        };

        let mut policies = Vec::with_capacity(writes.endorsements.len());
        for (key, policy) in &writes.endorsements {
            policies.push((key.as_bytes().to_vec(), policy.to_bytes()?));
        }

        let stamp = timestamp.to_rfc3339().into_bytes();

        let result = (
            &self.world_state,
            &self.endorsements,
            &self.events,
            &self.transactions,
        )
            .transaction(|(state, endorsements, events, txs)| {
                if txs.get(tx_id.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(tx_id.to_string()));
                }
                for (key, value) in &writes.state {
                    match value {
                        Some(bytes) => {
                            state.insert(key.as_bytes(), bytes.as_slice())?;
                        }
                        None => {
                            state.remove(key.as_bytes())?;
                        }
                    }
                }
                for (key, policy) in &policies {
                    endorsements.insert(key.as_slice(), policy.as_slice())?;
                }
                if let Some((seq, bytes)) = &event_bytes {
                    events.insert(seq.as_slice(), bytes.as_slice())?;
                }
                txs.insert(tx_id.as_bytes(), stamp.as_slice())?;
                Ok(())
            });

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(id)) => return Err(StoreError::DuplicateTx(id)),
            Err(TransactionError::Storage(e)) => return Err(StoreError::Sled(e)),
        }

        self.db.flush()?;
        tracing::debug!(
            tx_id,
            keys = writes.state.len(),
            policies = writes.endorsements.len(),
            event = writes.event.as_ref().map(|e| e.name.as_str()),
            "write set committed"
        );
        Ok(())
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Layout version recorded in the metadata tree.
    pub fn schema_version(&self) -> StoreResult<Option<u32>> {
        match self.metadata.get(META_SCHEMA_VERSION)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_ref().try_into().map_err(|_| {
                    StoreError::Serialization("invalid schema version bytes".to_string())
                })?;
                Ok(Some(u32::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }
}

fn decode_event(bytes: &[u8]) -> StoreResult<LoggedEvent> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
