//! # Ledger Configuration & Constants
//!
//! Every well-known record key and object-type prefix used by the contracts
//! lives here, next to the deployment policy that names the privileged
//! organizations.
//!
//! The key constants are part of the world-state layout. Changing them after
//! a channel has data on it orphans every existing record, so treat them as
//! frozen.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// World-State Keys
// ---------------------------------------------------------------------------

/// Singleton key holding the global token supply.
pub const TOTAL_SUPPLY_KEY: &str = "totalSupply";

/// Singleton key holding the mint/burn order table.
pub const MINT_BURN_KEY: &str = "MintBurn";

/// Composite-key object type for account balances: `balance/{principal}`.
pub const BALANCE_PREFIX: &str = "balance";

/// Composite-key object type for escrow holds: `hold/{principal}`.
pub const HOLD_PREFIX: &str = "hold";

/// Composite-key object type for spending allowances: `allowance/{owner}/{spender}`.
pub const ALLOWANCE_PREFIX: &str = "allowance";

/// Composite-key object type for auction bids: `bid/{auction}/{bidder}`.
pub const BID_PREFIX: &str = "bid";

// ---------------------------------------------------------------------------
// Domain Constants
// ---------------------------------------------------------------------------

/// Sentinel counterparty used in Transfer notifications for mint and burn.
pub const NULL_ADDRESS: &str = "0x0";

/// The only item the auction house sells.
pub const ENERGY_ITEM: &str = "energy(KWh)";

/// Object type stamped on auction records.
pub const AUCTION_OBJECT_TYPE: &str = "auction";

/// Event name for balance movements (mint, burn, transfer).
pub const EVENT_TRANSFER: &str = "Transfer";

/// Event name for allowance changes.
pub const EVENT_APPROVAL: &str = "Approval";

/// Organization that approves supply changes unless the policy says otherwise.
pub const DEFAULT_APPROVER_ORG: &str = "Org1MSP";

/// Organization allowed to call the direct burn primitive by default.
pub const DEFAULT_BURNER_ORG: &str = "Org1MSP";

/// File name `gridledger-node init` writes the policy to.
pub const POLICY_FILE_NAME: &str = "policy.json";

// ---------------------------------------------------------------------------
// Deployment Policy
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`LedgerPolicy`].
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed policy: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid policy: {0}")]
    Invalid(String),
}

/// Organizations holding privileged roles on this deployment.
///
/// Injected into the contracts instead of being compiled in, so two
/// channels can run the same code with different central banks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// MSP ID allowed to approve/reject supply orders and inspect auctions.
    #[serde(default = "default_approver_org")]
    pub approver_org: String,
    /// MSP ID allowed to call the direct `Burn` primitive.
    #[serde(default = "default_burner_org")]
    pub burner_org: String,
}

fn default_approver_org() -> String {
    DEFAULT_APPROVER_ORG.to_string()
}

fn default_burner_org() -> String {
    DEFAULT_BURNER_ORG.to_string()
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            approver_org: default_approver_org(),
            burner_org: default_burner_org(),
        }
    }
}

impl LedgerPolicy {
    /// Parse and validate a policy from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: LedgerPolicy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load a policy file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Write this policy to disk as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PolicyError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Reject policies that would lock everyone out of a privileged role.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.approver_org.trim().is_empty() {
            return Err(PolicyError::Invalid("approver_org must not be empty".into()));
        }
        if self.burner_org.trim().is_empty() {
            return Err(PolicyError::Invalid("burner_org must not be empty".into()));
        }
        Ok(())
    }
}
