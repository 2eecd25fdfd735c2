//! Notification payloads. Serialized as JSON into the invocation's event.

use serde::{Deserialize, Serialize};

/// Emitted as `Transfer` on mint, burn, transfer and transfer-from.
/// Mints come from, and burns go to, [`NULL_ADDRESS`](gridledger_protocol::config::NULL_ADDRESS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from: String,
    pub to: String,
    pub value: i64,
}

/// Emitted as `Approval` whenever an allowance is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub owner: String,
    pub spender: String,
    pub value: i64,
}
