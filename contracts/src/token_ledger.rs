//! # Token Ledger
//!
//! Fungible-token accounts keyed by principal ID, plus the two side records
//! that hang off an account:
//!
//! - **Balances** (`balance/{principal}`): the spendable amount. Kept in
//!   their own namespace so no principal ID can alias an auction or a
//!   singleton record.
//! - **Holds** (`hold/{principal}`): funds moved out of the active balance
//!   into escrow. Auctions place a hold for every bid.
//! - **Allowances** (`allowance/{owner}/{spender}`): how much a spender may
//!   still move out of the owner's account with `transfer_from`.
//!
//! ## Invariants
//!
//! - Balances never go negative. Every debit checks first.
//! - `total_supply` changes only on mint and burn. Transfers and hold
//!   movements conserve it.
//! - For one principal, `active + hold` is conserved by `create_hold` and
//!   `return_hold`; `execute_hold` reduces it by exactly the executed amount.
//!
//! ## Security Model
//!
//! - `mint` is crate-private. New supply only enters through an approved
//!   [`mint_burn`](crate::mint_burn) order.
//! - `burn` is restricted to the policy's burner organization, whether it
//!   is called directly or through an approved burn order.
//! - Escrow belongs to the counterparty, not the holder: `execute_hold` and
//!   `return_hold` are reserved for the approver organization, and auctions
//!   settle their bids' holds themselves when they end.

use gridledger_protocol::config::{
    LedgerPolicy, ALLOWANCE_PREFIX, BALANCE_PREFIX, EVENT_APPROVAL, EVENT_TRANSFER, HOLD_PREFIX,
    NULL_ADDRESS, TOTAL_SUPPLY_KEY,
};
use gridledger_protocol::storage::composite_key;
use gridledger_protocol::TxContext;
use serde::{Deserialize, Serialize};

use crate::error::{checked_add, checked_sub, require_positive, ContractError, ContractResult};
use crate::events::{ApprovalEvent, TransferEvent};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Snapshot of the caller's account as returned by `GetAccount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub client_id: String,
    /// Spendable balance.
    pub active: i64,
    /// Amount currently escrowed.
    pub on_hold: i64,
}

/// Balances, holds, allowances, and total supply.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    policy: LedgerPolicy,
}

impl TokenLedger {
    pub fn new(policy: LedgerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    // -- Accounts -----------------------------------------------------------

    /// Open a zero-balance account for the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::AlreadyExists`] if the caller has an account.
    pub fn create_account(&self, ctx: &mut TxContext<'_>) -> ContractResult<()> {
        let client_id = ctx.caller_id().to_string();
        if read_balance(ctx, &client_id)?.is_some() {
            return Err(ContractError::AlreadyExists(format!(
                "account {client_id} already exists"
            )));
        }
        write_balance(ctx, &client_id, 0)?;
        tracing::info!(account = %client_id, "account created");
        Ok(())
    }

    /// Balance of any account.
    pub fn balance_of(&self, ctx: &TxContext<'_>, account: &str) -> ContractResult<i64> {
        read_balance(ctx, account)?
            .ok_or_else(|| ContractError::NotFound(format!("the account {account} does not exist")))
    }

    /// Balance of the caller's account.
    pub fn client_account_balance(&self, ctx: &TxContext<'_>) -> ContractResult<i64> {
        self.balance_of(ctx, ctx.caller_id())
    }

    /// The caller's account ID, which doubles as its payment address.
    pub fn client_account_id(&self, ctx: &TxContext<'_>) -> ContractResult<String> {
        Ok(ctx.caller_id().to_string())
    }

    /// Total tokens in existence (zero before the first mint).
    pub fn total_supply(&self, ctx: &TxContext<'_>) -> ContractResult<i64> {
        let supply = ctx.get_record::<i64>(TOTAL_SUPPLY_KEY)?.unwrap_or(0);
        tracing::debug!(supply, "total supply read");
        Ok(supply)
    }

    /// Caller's active balance together with its outstanding hold.
    pub fn get_account(&self, ctx: &TxContext<'_>) -> ContractResult<Account> {
        let client_id = ctx.caller_id().to_string();
        let active = self.balance_of(ctx, &client_id)?;
        let on_hold = self.hold_of(ctx, &client_id)?;
        Ok(Account {
            client_id,
            active,
            on_hold,
        })
    }

    // -- Supply -------------------------------------------------------------

    /// Create `amount` new tokens in the caller's account. No authorization
    /// here; callers are expected to have checked it.
    pub(crate) fn mint(&self, ctx: &mut TxContext<'_>, amount: i64) -> ContractResult<()> {
        let minter = ctx.caller_id().to_string();
        self.mint_to(ctx, &minter, amount)
    }

    /// Destroy `amount` tokens from the caller's account.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::PermissionDenied`] unless the caller belongs
    /// to the policy's burner organization.
    pub fn burn(&self, ctx: &mut TxContext<'_>, amount: i64) -> ContractResult<()> {
        self.require_burner(ctx)?;
        let burner = ctx.caller_id().to_string();
        self.burn_from(ctx, &burner, amount)
    }

    pub(crate) fn require_burner(&self, ctx: &TxContext<'_>) -> ContractResult<()> {
        if ctx.caller_org() != self.policy.burner_org {
            return Err(ContractError::PermissionDenied(format!(
                "organization {} is not authorized to burn tokens",
                ctx.caller_org()
            )));
        }
        Ok(())
    }

    /// Mint into `account`, creating its balance record if needed.
    fn mint_to(
        &self,
        ctx: &mut TxContext<'_>,
        account: &str,
        amount: i64,
    ) -> ContractResult<()> {
        require_positive("mint amount", amount)?;

        let current = read_balance(ctx, account)?.unwrap_or(0);
        let updated = checked_add(current, amount)?;
        let supply = ctx.get_record::<i64>(TOTAL_SUPPLY_KEY)?.unwrap_or(0);
        let new_supply = checked_add(supply, amount)?;

        write_balance(ctx, account, updated)?;
        ctx.put_record(TOTAL_SUPPLY_KEY, &new_supply)?;
        ctx.emit_event(
            EVENT_TRANSFER,
            &TransferEvent {
                from: NULL_ADDRESS.to_string(),
                to: account.to_string(),
                value: amount,
            },
        )?;

        tracing::info!(account, from = current, to = updated, "minter balance updated");
        Ok(())
    }

    fn burn_from(
        &self,
        ctx: &mut TxContext<'_>,
        account: &str,
        amount: i64,
    ) -> ContractResult<()> {
        require_positive("burn amount", amount)?;

        let current = read_balance(ctx, account)?
            .ok_or_else(|| ContractError::NotFound(format!("the account {account} does not exist")))?;
        if current < amount {
            return Err(ContractError::FailedPrecondition(format!(
                "account {account} has {current}, cannot burn {amount}"
            )));
        }
        let supply = ctx.get_record::<i64>(TOTAL_SUPPLY_KEY)?.ok_or_else(|| {
            ContractError::FailedPrecondition("total supply does not exist".to_string())
        })?;
        if supply < amount {
            return Err(ContractError::FailedPrecondition(format!(
                "total supply {supply} is smaller than burn amount {amount}"
            )));
        }

        let updated = current - amount;
        write_balance(ctx, account, updated)?;
        ctx.put_record(TOTAL_SUPPLY_KEY, &(supply - amount))?;
        ctx.emit_event(
            EVENT_TRANSFER,
            &TransferEvent {
                from: account.to_string(),
                to: NULL_ADDRESS.to_string(),
                value: amount,
            },
        )?;

        tracing::info!(account, from = current, to = updated, "burner balance updated");
        Ok(())
    }

    // -- Transfers ----------------------------------------------------------

    /// Move `amount` from the caller to `recipient`.
    pub fn transfer(
        &self,
        ctx: &mut TxContext<'_>,
        recipient: &str,
        amount: i64,
    ) -> ContractResult<()> {
        let sender = ctx.caller_id().to_string();
        move_balance(ctx, &sender, recipient, amount)?;
        ctx.emit_event(
            EVENT_TRANSFER,
            &TransferEvent {
                from: sender,
                to: recipient.to_string(),
                value: amount,
            },
        )?;
        Ok(())
    }

    /// Move `value` from `from` to `to` on the strength of the caller's
    /// allowance, and draw the allowance down by `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::FailedPrecondition`] if the allowance is
    /// smaller than `value`, plus everything [`transfer`](Self::transfer) can
    /// return.
    pub fn transfer_from(
        &self,
        ctx: &mut TxContext<'_>,
        from: &str,
        to: &str,
        value: i64,
    ) -> ContractResult<()> {
        let spender = ctx.caller_id().to_string();
        let key = allowance_key(from, &spender)?;
        let current = ctx.get_record::<i64>(&key)?.unwrap_or(0);
        if current < value {
            return Err(ContractError::FailedPrecondition(format!(
                "spender {spender} has allowance {current}, needs {value}"
            )));
        }

        move_balance(ctx, from, to, value)?;

        let updated = current - value;
        ctx.put_record(&key, &updated)?;
        ctx.emit_event(
            EVENT_TRANSFER,
            &TransferEvent {
                from: from.to_string(),
                to: to.to_string(),
                value,
            },
        )?;

        tracing::info!(spender = %spender, from = current, to = updated, "allowance updated");
        Ok(())
    }

    // -- Allowances ---------------------------------------------------------

    /// Set (not add to) how much `spender` may move out of the caller's account.
    pub fn approve(&self, ctx: &mut TxContext<'_>, spender: &str, value: i64) -> ContractResult<()> {
        if value < 0 {
            return Err(ContractError::InvalidArgument(format!(
                "allowance cannot be negative, got {value}"
            )));
        }
        let owner = ctx.caller_id().to_string();
        let key = allowance_key(&owner, spender)?;
        ctx.put_record(&key, &value)?;
        ctx.emit_event(
            EVENT_APPROVAL,
            &ApprovalEvent {
                owner: owner.clone(),
                spender: spender.to_string(),
                value,
            },
        )?;

        tracing::info!(owner = %owner, spender, value, "withdrawal allowance approved");
        Ok(())
    }

    /// Remaining allowance of `spender` over `owner`'s account (zero if unset).
    pub fn allowance(&self, ctx: &TxContext<'_>, owner: &str, spender: &str) -> ContractResult<i64> {
        let key = allowance_key(owner, spender)?;
        Ok(ctx.get_record::<i64>(&key)?.unwrap_or(0))
    }

    // -- Holds --------------------------------------------------------------

    /// Amount escrowed for `principal` (zero if none).
    pub fn hold_of(&self, ctx: &TxContext<'_>, principal: &str) -> ContractResult<i64> {
        Ok(ctx.get_record::<i64>(&hold_key(principal)?)?.unwrap_or(0))
    }

    /// Move `amount` from the caller's active balance into its hold.
    pub fn create_hold(&self, ctx: &mut TxContext<'_>, amount: i64) -> ContractResult<()> {
        require_positive("hold amount", amount)?;

        let client_id = ctx.caller_id().to_string();
        let current = self.balance_of(ctx, &client_id)?;
        if current < amount {
            return Err(ContractError::FailedPrecondition(format!(
                "account {client_id} has {current}, cannot hold {amount}"
            )));
        }

        let key = hold_key(&client_id)?;
        let held = ctx.get_record::<i64>(&key)?.unwrap_or(0);
        let new_hold = checked_add(held, amount)?;

        write_balance(ctx, &client_id, current - amount)?;
        ctx.put_record(&key, &new_hold)?;

        tracing::info!(account = %client_id, amount, hold = new_hold, "hold created");
        Ok(())
    }

    /// Settle `holder`'s hold: `amount` goes to the caller, the rest goes
    /// back to the holder, and the hold is cleared.
    ///
    /// # Errors
    ///
    /// - [`ContractError::PermissionDenied`] unless the caller belongs to the
    ///   approver organization.
    /// - [`ContractError::InvalidArgument`] if `amount` is not positive.
    /// - [`ContractError::NotFound`] if the holder has no hold, or either
    ///   party has no account.
    /// - [`ContractError::FailedPrecondition`] if `amount` exceeds the hold.
    pub fn execute_hold(
        &self,
        ctx: &mut TxContext<'_>,
        holder: &str,
        amount: i64,
    ) -> ContractResult<()> {
        self.require_approver(ctx, "execute holds")?;
        require_positive("hold amount", amount)?;

        let key = hold_key(holder)?;
        let held = ctx
            .get_record::<i64>(&key)?
            .ok_or_else(|| ContractError::NotFound(format!("no hold for {holder}")))?;
        if held < amount {
            return Err(ContractError::FailedPrecondition(format!(
                "hold for {holder} is {held}, cannot execute {amount}"
            )));
        }

        let executor = ctx.caller_id().to_string();
        let executor_balance = self.balance_of(ctx, &executor)?;
        let holder_balance = self.balance_of(ctx, holder)?;
        let leftover = checked_sub(held, amount)?;

        if executor == holder {
            write_balance(ctx, holder, checked_add(holder_balance, held)?)?;
        } else {
            write_balance(ctx, &executor, checked_add(executor_balance, amount)?)?;
            write_balance(ctx, holder, checked_add(holder_balance, leftover)?)?;
        }
        ctx.put_record(&key, &0i64)?;

        tracing::info!(
            holder,
            executor = %executor,
            amount,
            refunded = leftover,
            "hold executed"
        );
        Ok(())
    }

    /// Refund `holder`'s entire hold to its active balance. Approver only.
    pub fn return_hold(&self, ctx: &mut TxContext<'_>, holder: &str) -> ContractResult<()> {
        self.require_approver(ctx, "return holds")?;
        let key = hold_key(holder)?;
        let held = ctx
            .get_record::<i64>(&key)?
            .ok_or_else(|| ContractError::NotFound(format!("no hold for {holder}")))?;
        let current = self.balance_of(ctx, holder)?;
        let updated = checked_add(current, held)?;

        write_balance(ctx, holder, updated)?;
        ctx.put_record(&key, &0i64)?;

        tracing::info!(holder, refunded = held, from = current, to = updated, "hold returned");
        Ok(())
    }

    /// Pay `amount` out of `holder`'s hold to `payee`, leaving the rest of
    /// the hold in place. Used when an auction settles its winning bid.
    pub(crate) fn settle_hold(
        &self,
        ctx: &mut TxContext<'_>,
        holder: &str,
        payee: &str,
        amount: i64,
    ) -> ContractResult<()> {
        draw_hold(ctx, holder, amount)?;
        let current = read_balance(ctx, payee)?.unwrap_or(0);
        let updated = checked_add(current, amount)?;
        write_balance(ctx, payee, updated)?;
        ctx.emit_event(
            EVENT_TRANSFER,
            &TransferEvent {
                from: holder.to_string(),
                to: payee.to_string(),
                value: amount,
            },
        )?;

        tracing::info!(holder, payee, amount, from = current, to = updated, "hold settled");
        Ok(())
    }

    /// Return `amount` of `holder`'s hold to its active balance, leaving the
    /// rest of the hold in place. Used for losing auction bids.
    pub(crate) fn release_hold(
        &self,
        ctx: &mut TxContext<'_>,
        holder: &str,
        amount: i64,
    ) -> ContractResult<()> {
        draw_hold(ctx, holder, amount)?;
        let current = self.balance_of(ctx, holder)?;
        let updated = checked_add(current, amount)?;
        write_balance(ctx, holder, updated)?;

        tracing::info!(holder, amount, from = current, to = updated, "hold released");
        Ok(())
    }

    fn require_approver(&self, ctx: &TxContext<'_>, action: &str) -> ContractResult<()> {
        if ctx.caller_org() != self.policy.approver_org {
            return Err(ContractError::PermissionDenied(format!(
                "organization {} is not authorized to {action}",
                ctx.caller_org()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hold_key(principal: &str) -> ContractResult<String> {
    Ok(composite_key(HOLD_PREFIX, &[principal])?)
}

fn allowance_key(owner: &str, spender: &str) -> ContractResult<String> {
    Ok(composite_key(ALLOWANCE_PREFIX, &[owner, spender])?)
}

fn balance_key(account: &str) -> ContractResult<String> {
    Ok(composite_key(BALANCE_PREFIX, &[account])?)
}

fn read_balance(ctx: &TxContext<'_>, account: &str) -> ContractResult<Option<i64>> {
    Ok(ctx.get_record::<i64>(&balance_key(account)?)?)
}

fn write_balance(ctx: &mut TxContext<'_>, account: &str, balance: i64) -> ContractResult<()> {
    Ok(ctx.put_record(&balance_key(account)?, &balance)?)
}

/// Take `amount` off `holder`'s hold without crediting anyone.
fn draw_hold(ctx: &mut TxContext<'_>, holder: &str, amount: i64) -> ContractResult<()> {
    require_positive("hold amount", amount)?;
    let key = hold_key(holder)?;
    let held = ctx.get_record::<i64>(&key)?.unwrap_or(0);
    if held < amount {
        return Err(ContractError::FailedPrecondition(format!(
            "hold for {holder} is {held}, cannot draw {amount}"
        )));
    }
    ctx.put_record(&key, &(held - amount))?;
    Ok(())
}

/// Shared body of `transfer` and `transfer_from`. A zero-value transfer is
/// allowed; a negative one is not.
fn move_balance(ctx: &mut TxContext<'_>, from: &str, to: &str, value: i64) -> ContractResult<()> {
    if value < 0 {
        return Err(ContractError::InvalidArgument(format!(
            "transfer amount cannot be negative, got {value}"
        )));
    }

    let from_balance = read_balance(ctx, from)?
        .ok_or_else(|| ContractError::NotFound(format!("client account {from} has no balance")))?;
    if from_balance < value {
        return Err(ContractError::FailedPrecondition(format!(
            "client account {from} has insufficient funds"
        )));
    }
    if from == to {
        return Ok(());
    }

    let to_balance = read_balance(ctx, to)?.unwrap_or(0);
    let from_updated = from_balance - value;
    let to_updated = checked_add(to_balance, value)?;

    write_balance(ctx, from, from_updated)?;
    write_balance(ctx, to, to_updated)?;

    tracing::info!(account = from, from = from_balance, to = from_updated, "sender balance updated");
    tracing::info!(account = to, from = to_balance, to = to_updated, "recipient balance updated");
    Ok(())
}
