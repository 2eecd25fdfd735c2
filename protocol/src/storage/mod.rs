//! # Storage Module
//!
//! The world state the contracts run against. Contracts never touch sled
//! directly: they go through a [`ChainStub`](crate::host::ChainStub), and the
//! stub decides whether writes land immediately (tests) or are buffered in an
//! invocation write set and committed atomically (the node).
//!
//! ## Architecture
//!
//! ```text
//! keys.rs: composite keys of the form \0{type}\0{attr}\0...
//! endorsement.rs: per-record endorsement policies (sets of MSP IDs)
//! db.rs: LedgerDB, the sled trees for world state, policies, events
//! ```
//!
//! ## Tree Layout
//!
//! | Tree           | Key                   | Value                          |
//! |----------------|-----------------------|--------------------------------|
//! | `world_state`  | record key (UTF-8)    | record bytes (contract-owned)  |
//! | `endorsements` | record key (UTF-8)    | `bincode(EndorsementPolicy)`   |
//! | `events`       | sequence (8B BE)      | `bincode(LoggedEvent)`         |
//! | `transactions` | tx ID (UTF-8)         | commit timestamp (RFC 3339)    |
//! | `metadata`     | key (UTF-8)           | value (bytes)                  |

pub mod db;
pub mod endorsement;
pub mod keys;

pub use db::{LedgerDB, LoggedEvent, WriteSet};
pub use endorsement::EndorsementPolicy;
pub use keys::{composite_key, is_composite_key, split_composite_key};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors surfaced by the world state and the host stubs.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("transaction {0} has already been committed")]
    DuplicateTx(String),

    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
