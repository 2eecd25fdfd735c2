//! # GridLedger Contracts
//!
//! Business logic of the energy market. Everything here runs inside one
//! invocation against a [`TxContext`](gridledger_protocol::TxContext) and
//! keeps no state of its own between calls:
//!
//! - **Token Ledger**: account balances, escrow holds, spending
//!   allowances, total supply.
//! - **Mint/Burn Workflow**: order, approve, execute: supply changes gated
//!   by the approving organization.
//! - **Auction**: energy auctions with open and sealed bids, each revealed
//!   bid escrowed on the ledger.
//!
//! [`EnergyMarketContract`] bundles the three and dispatches client calls
//! by function name.
//!
//! ## Design Principles
//!
//! 1. All amounts are `i64` and every addition is checked. Overflow is an
//!    invalid argument, never a wrap.
//! 2. Validate first, write after. An operation that fails has not written
//!    anything, except the documented auto-expiry cleanup.
//! 3. State transitions are explicit enum variants.
//! 4. Authorization comes from the injected [`LedgerPolicy`](gridledger_protocol::LedgerPolicy),
//!    not from organization names baked into the code.

pub mod auction;
pub mod contract;
pub mod error;
pub mod events;
pub mod mint_burn;
pub mod token_ledger;

pub use auction::{bid_commitment, Auction, AuctionHouse, AuctionStatus};
pub use contract::EnergyMarketContract;
pub use error::{ContractError, ContractResult, ErrorKind};
pub use mint_burn::{MintBurnWorkflow, Order, OrderKind, OrderStatus};
pub use token_ledger::{Account, TokenLedger};
