// Copyright (c) 2026 GridLedger Contributors. MIT License.
// See LICENSE for details.

//! # GridLedger Protocol: Host Platform Layer
//!
//! The contracts in `gridledger-contracts` hold all the business rules of the
//! energy market: balances, holds, supply orders, auctions. What they do not
//! do is store bytes, tell time, know who is calling, or publish events. That
//! is this crate.
//!
//! ## Architecture
//!
//! - **host**: The [`ChainStub`](host::ChainStub) and
//!   [`ClientIdentity`](host::ClientIdentity) traits, the
//!   [`TxContext`](host::TxContext) the contracts program against, a buffered
//!   [`Invocation`](host::Invocation), and an in-memory
//!   [`MockStub`](host::MockStub) for tests.
//! - **storage**: Composite keys, endorsement policies, and the sled-backed
//!   [`LedgerDB`](storage::LedgerDB).
//! - **config**: Well-known record keys and the deployment
//!   [`LedgerPolicy`](config::LedgerPolicy).
//!
//! ## Execution Model
//!
//! 1. One operation per invocation. Nothing survives in memory between calls.
//! 2. An invocation either commits every write it made or none of them.
//! 3. Time comes from the invocation timestamp, never from the local clock.

pub mod config;
pub mod host;
pub mod storage;

pub use config::LedgerPolicy;
pub use host::{Caller, ChainStub, ClientIdentity, Invocation, MockStub, TxContext};
pub use storage::{LedgerDB, StoreError, StoreResult};
