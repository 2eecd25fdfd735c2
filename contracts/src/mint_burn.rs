//! # Mint/Burn Approval Workflow
//!
//! Supply changes that need a sign-off from the approving organization (the
//! central bank role). Each principal has at most one outstanding order:
//!
//! ```text
//!   OrderMint / OrderBurn        Approve*          Execute*
//!  ──────────────────────► Ordered ──────► Approved ──────► (deleted)
//!                              │
//!                              │ Reject*
//!                              ▼
//!                          Rejected
//! ```
//!
//! A new order from the same principal overwrites whatever was there,
//! including a rejected or approved-but-unexecuted one. The whole table
//! lives under a single key, so every call is one read-modify-write.

use std::collections::BTreeMap;

use gridledger_protocol::config::MINT_BURN_KEY;
use gridledger_protocol::TxContext;
use serde::{Deserialize, Serialize};

use crate::error::{require_positive, ContractError, ContractResult};
use crate::token_ledger::TokenLedger;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Direction of a supply change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Mint,
    Burn,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Mint => write!(f, "Mint"),
            OrderKind::Burn => write!(f, "Burn"),
        }
    }
}

/// Where an order stands in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Waiting for the approving organization.
    Ordered,
    /// Cleared for execution by the ordering principal.
    Approved,
    /// Turned down. Stays until overwritten by a new order.
    Rejected,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Ordered => write!(f, "Ordered"),
            OrderStatus::Approved => write!(f, "Approved"),
            OrderStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub kind: OrderKind,
    pub amount: i64,
    pub status: OrderStatus,
}

/// Every outstanding order, keyed by principal.
pub type OrderTable = BTreeMap<String, Order>;

/// The approval gate in front of the ledger's mint and burn primitives.
#[derive(Debug, Clone)]
pub struct MintBurnWorkflow {
    ledger: TokenLedger,
}

impl MintBurnWorkflow {
    pub fn new(ledger: TokenLedger) -> Self {
        Self { ledger }
    }

    // -- Ordering -----------------------------------------------------------

    pub fn order_mint(&self, ctx: &mut TxContext<'_>, amount: i64) -> ContractResult<()> {
        self.place_order(ctx, OrderKind::Mint, amount)
    }

    pub fn order_burn(&self, ctx: &mut TxContext<'_>, amount: i64) -> ContractResult<()> {
        self.place_order(ctx, OrderKind::Burn, amount)
    }

    fn place_order(&self, ctx: &mut TxContext<'_>, kind: OrderKind, amount: i64) -> ContractResult<()> {
        require_positive("order amount", amount)?;

        let principal = ctx.caller_id().to_string();
        // Only account holders may order.
        self.ledger.balance_of(ctx, &principal)?;

        let mut table = load_table(ctx)?;
        let replaced = table.insert(
            principal.clone(),
            Order {
                kind,
                amount,
                status: OrderStatus::Ordered,
            },
        );
        store_table(ctx, &table)?;

        tracing::info!(
            principal = %principal,
            %kind,
            amount,
            replaced = replaced.is_some(),
            "supply order placed"
        );
        Ok(())
    }

    // -- Approval -----------------------------------------------------------

    pub fn approve_mint(&self, ctx: &mut TxContext<'_>, principal: &str) -> ContractResult<()> {
        self.decide(ctx, principal, OrderKind::Mint, OrderStatus::Approved)
    }

    pub fn approve_burn(&self, ctx: &mut TxContext<'_>, principal: &str) -> ContractResult<()> {
        self.decide(ctx, principal, OrderKind::Burn, OrderStatus::Approved)
    }

    pub fn reject_mint(&self, ctx: &mut TxContext<'_>, principal: &str) -> ContractResult<()> {
        self.decide(ctx, principal, OrderKind::Mint, OrderStatus::Rejected)
    }

    pub fn reject_burn(&self, ctx: &mut TxContext<'_>, principal: &str) -> ContractResult<()> {
        self.decide(ctx, principal, OrderKind::Burn, OrderStatus::Rejected)
    }

    /// Move an `Ordered` order of `kind` to `outcome`.
    fn decide(
        &self,
        ctx: &mut TxContext<'_>,
        principal: &str,
        kind: OrderKind,
        outcome: OrderStatus,
    ) -> ContractResult<()> {
        self.require_approver(ctx)?;

        let mut table = load_table(ctx)?;
        let order = table
            .get_mut(principal)
            .filter(|order| order.kind == kind)
            .ok_or_else(|| ContractError::NotFound(format!("no {kind} order for {principal}")))?;
        if order.status != OrderStatus::Ordered {
            return Err(ContractError::FailedPrecondition(format!(
                "{kind} order for {principal} is {}, not Ordered",
                order.status
            )));
        }
        order.status = outcome;
        store_table(ctx, &table)?;

        tracing::info!(principal, %kind, status = %outcome, "supply order decided");
        Ok(())
    }

    // -- Execution ----------------------------------------------------------

    /// Mint the caller's approved order. `amount` must match the order.
    pub fn execute_mint(&self, ctx: &mut TxContext<'_>, amount: i64) -> ContractResult<()> {
        self.take_approved(ctx, OrderKind::Mint, amount)?;
        self.ledger.mint(ctx, amount)
    }

    /// Burn the caller's approved order. `amount` must match the order, and
    /// the caller must still belong to the burner organization.
    pub fn execute_burn(&self, ctx: &mut TxContext<'_>, amount: i64) -> ContractResult<()> {
        self.ledger.require_burner(ctx)?;
        self.take_approved(ctx, OrderKind::Burn, amount)?;
        self.ledger.burn(ctx, amount)
    }

    /// Check the caller's order is approved for exactly `amount` and remove
    /// it from the table.
    fn take_approved(
        &self,
        ctx: &mut TxContext<'_>,
        kind: OrderKind,
        amount: i64,
    ) -> ContractResult<()> {
        let principal = ctx.caller_id().to_string();
        let mut table = load_table(ctx)?;
        let order = table
            .get(&principal)
            .copied()
            .ok_or_else(|| ContractError::NotFound(format!("no order for {principal}")))?;

        if order.kind != kind {
            return Err(ContractError::FailedPrecondition(format!(
                "order for {principal} is a {} order, not {kind}",
                order.kind
            )));
        }
        if order.status != OrderStatus::Approved {
            return Err(ContractError::FailedPrecondition(format!(
                "{kind} order for {principal} is {}, not Approved",
                order.status
            )));
        }
        if order.amount != amount {
            return Err(ContractError::FailedPrecondition(format!(
                "{kind} order for {principal} is for {}, not {amount}",
                order.amount
            )));
        }

        table.remove(&principal);
        store_table(ctx, &table)?;
        tracing::info!(principal = %principal, %kind, amount, "supply order executed");
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    pub fn get_mint_order(&self, ctx: &TxContext<'_>) -> ContractResult<Order> {
        own_order(ctx, OrderKind::Mint)
    }

    pub fn get_burn_order(&self, ctx: &TxContext<'_>) -> ContractResult<Order> {
        own_order(ctx, OrderKind::Burn)
    }

    /// Mint orders still waiting for a decision. Approver only.
    pub fn get_mint_orders(&self, ctx: &TxContext<'_>) -> ContractResult<OrderTable> {
        self.require_approver(ctx)?;
        pending(ctx, OrderKind::Mint)
    }

    /// Burn orders still waiting for a decision. Approver only.
    pub fn get_burn_orders(&self, ctx: &TxContext<'_>) -> ContractResult<OrderTable> {
        self.require_approver(ctx)?;
        pending(ctx, OrderKind::Burn)
    }

    fn require_approver(&self, ctx: &TxContext<'_>) -> ContractResult<()> {
        let approver = &self.ledger.policy().approver_org;
        if ctx.caller_org() != approver.as_str() {
            return Err(ContractError::PermissionDenied(format!(
                "organization {} is not the approving organization",
                ctx.caller_org()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Table storage
// ---------------------------------------------------------------------------

fn load_table(ctx: &TxContext<'_>) -> ContractResult<OrderTable> {
    Ok(ctx.get_record::<OrderTable>(MINT_BURN_KEY)?.unwrap_or_default())
}

fn store_table(ctx: &mut TxContext<'_>, table: &OrderTable) -> ContractResult<()> {
    Ok(ctx.put_record(MINT_BURN_KEY, table)?)
}

fn own_order(ctx: &TxContext<'_>, kind: OrderKind) -> ContractResult<Order> {
    let principal = ctx.caller_id();
    load_table(ctx)?
        .remove(principal)
        .filter(|order| order.kind == kind)
        .ok_or_else(|| ContractError::NotFound(format!("no {kind} order for {principal}")))
}

fn pending(ctx: &TxContext<'_>, kind: OrderKind) -> ContractResult<OrderTable> {
    let mut table = load_table(ctx)?;
    table.retain(|_, order| order.kind == kind && order.status == OrderStatus::Ordered);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridledger_protocol::{Caller, LedgerPolicy, MockStub};

    fn run<T>(
        stub: &mut MockStub,
        who: &Caller,
        f: impl FnOnce(&mut TxContext<'_>) -> T,
    ) -> T {
        let mut ctx = TxContext::new(stub, who);
        f(&mut ctx)
    }

    fn setup() -> (MockStub, TokenLedger, MintBurnWorkflow) {
        let ledger = TokenLedger::new(LedgerPolicy::default());
        let workflow = MintBurnWorkflow::new(ledger.clone());
        (MockStub::new(), ledger, workflow)
    }

    #[test]
    fn order_requires_account() {
        let (mut stub, _, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        let result = run(&mut stub, &alice, |ctx| workflow.order_mint(ctx, 10));
        assert!(matches!(result, Err(ContractError::NotFound(_))));
    }

    #[test]
    fn order_rejects_non_positive_amount() {
        let (mut stub, ledger, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        run(&mut stub, &alice, |ctx| ledger.create_account(ctx)).unwrap();
        let result = run(&mut stub, &alice, |ctx| workflow.order_burn(ctx, 0));
        assert!(matches!(result, Err(ContractError::InvalidArgument(_))));
    }

    #[test]
    fn burn_order_is_recorded_as_burn() {
        let (mut stub, ledger, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        let bob = Caller::new("bob", "Org2MSP");
        run(&mut stub, &alice, |ctx| ledger.create_account(ctx)).unwrap();
        run(&mut stub, &bob, |ctx| ledger.create_account(ctx)).unwrap();

        run(&mut stub, &alice, |ctx| workflow.order_mint(ctx, 5)).unwrap();
        run(&mut stub, &bob, |ctx| workflow.order_burn(ctx, 7)).unwrap();

        let order = run(&mut stub, &bob, |ctx| workflow.get_burn_order(ctx)).unwrap();
        assert_eq!(order.kind, OrderKind::Burn);
        assert_eq!(order.amount, 7);
        let wrong_kind = run(&mut stub, &bob, |ctx| workflow.get_mint_order(ctx));
        assert!(matches!(wrong_kind, Err(ContractError::NotFound(_))));
    }

    #[test]
    fn only_approver_decides() {
        let (mut stub, ledger, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        run(&mut stub, &alice, |ctx| {
            ledger.create_account(ctx).unwrap();
            workflow.order_mint(ctx, 10).unwrap();
        });

        let denied = run(&mut stub, &alice, |ctx| workflow.approve_mint(ctx, "alice"));
        assert!(matches!(denied, Err(ContractError::PermissionDenied(_))));
        let listing = run(&mut stub, &alice, |ctx| workflow.get_mint_orders(ctx));
        assert!(matches!(listing, Err(ContractError::PermissionDenied(_))));
    }

    #[test]
    fn decisions_only_apply_to_ordered_orders_of_the_right_kind() {
        let (mut stub, ledger, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        let bank = Caller::new("bank", "Org1MSP");
        run(&mut stub, &alice, |ctx| {
            ledger.create_account(ctx).unwrap();
            workflow.order_mint(ctx, 10).unwrap();
        });

        let wrong_kind = run(&mut stub, &bank, |ctx| workflow.approve_burn(ctx, "alice"));
        assert!(matches!(wrong_kind, Err(ContractError::NotFound(_))));

        run(&mut stub, &bank, |ctx| workflow.reject_mint(ctx, "alice")).unwrap();
        let again = run(&mut stub, &bank, |ctx| workflow.approve_mint(ctx, "alice"));
        assert!(matches!(again, Err(ContractError::FailedPrecondition(_))));

        let order = run(&mut stub, &alice, |ctx| workflow.get_mint_order(ctx)).unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
    }

    #[test]
    fn pending_listing_filters_by_kind_and_status() {
        let (mut stub, ledger, workflow) = setup();
        let bank = Caller::new("bank", "Org1MSP");
        for (name, kind) in [("a", OrderKind::Mint), ("b", OrderKind::Mint), ("c", OrderKind::Burn)] {
            let who = Caller::new(name, "Org2MSP");
            run(&mut stub, &who, |ctx| {
                ledger.create_account(ctx).unwrap();
                match kind {
                    OrderKind::Mint => workflow.order_mint(ctx, 1).unwrap(),
                    OrderKind::Burn => workflow.order_burn(ctx, 1).unwrap(),
                }
            });
        }
        run(&mut stub, &bank, |ctx| workflow.approve_mint(ctx, "b")).unwrap();

        let mints = run(&mut stub, &bank, |ctx| workflow.get_mint_orders(ctx)).unwrap();
        assert_eq!(mints.keys().collect::<Vec<_>>(), vec!["a"]);
        let burns = run(&mut stub, &bank, |ctx| workflow.get_burn_orders(ctx)).unwrap();
        assert_eq!(burns.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn approved_mint_executes_once() {
        let (mut stub, ledger, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        let bank = Caller::new("bank", "Org1MSP");
        run(&mut stub, &alice, |ctx| {
            ledger.create_account(ctx).unwrap();
            workflow.order_mint(ctx, 100).unwrap();
        });

        let early = run(&mut stub, &alice, |ctx| workflow.execute_mint(ctx, 100));
        assert!(matches!(early, Err(ContractError::FailedPrecondition(_))));

        run(&mut stub, &bank, |ctx| workflow.approve_mint(ctx, "alice")).unwrap();
        let wrong_amount = run(&mut stub, &alice, |ctx| workflow.execute_mint(ctx, 99));
        assert!(matches!(wrong_amount, Err(ContractError::FailedPrecondition(_))));

        run(&mut stub, &alice, |ctx| {
            workflow.execute_mint(ctx, 100).unwrap();
            assert_eq!(ledger.balance_of(ctx, "alice").unwrap(), 100);
            assert_eq!(ledger.total_supply(ctx).unwrap(), 100);
            assert!(matches!(
                workflow.get_mint_order(ctx),
                Err(ContractError::NotFound(_))
            ));
        });
    }

    #[test]
    fn approved_burn_still_requires_burner_org() {
        let (mut stub, ledger, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        let bank = Caller::new("bank", "Org1MSP");
        run(&mut stub, &alice, |ctx| {
            ledger.create_account(ctx).unwrap();
            ledger.mint(ctx, 50).unwrap();
            workflow.order_burn(ctx, 20).unwrap();
        });
        run(&mut stub, &bank, |ctx| workflow.approve_burn(ctx, "alice")).unwrap();

        let as_mint = run(&mut stub, &alice, |ctx| workflow.execute_mint(ctx, 20));
        assert!(matches!(as_mint, Err(ContractError::FailedPrecondition(_))));

        let denied = run(&mut stub, &alice, |ctx| workflow.execute_burn(ctx, 20));
        assert!(matches!(denied, Err(ContractError::PermissionDenied(_))));
        run(&mut stub, &alice, |ctx| {
            assert_eq!(workflow.get_burn_order(ctx).unwrap().status, OrderStatus::Approved);
            assert_eq!(ledger.balance_of(ctx, "alice").unwrap(), 50);
            assert_eq!(ledger.total_supply(ctx).unwrap(), 50);
        });
    }

    #[test]
    fn approved_burn_executes_for_burner_org() {
        let (mut stub, ledger, workflow) = setup();
        let bank = Caller::new("bank", "Org1MSP");
        run(&mut stub, &bank, |ctx| {
            ledger.create_account(ctx).unwrap();
            ledger.mint(ctx, 50).unwrap();
            workflow.order_burn(ctx, 20).unwrap();
            workflow.approve_burn(ctx, "bank").unwrap();
            workflow.execute_burn(ctx, 20).unwrap();
            assert_eq!(ledger.balance_of(ctx, "bank").unwrap(), 30);
            assert_eq!(ledger.total_supply(ctx).unwrap(), 30);
            assert!(matches!(
                workflow.get_burn_order(ctx),
                Err(ContractError::NotFound(_))
            ));
        });
    }

    #[test]
    fn new_order_overwrites_previous() {
        let (mut stub, ledger, workflow) = setup();
        let alice = Caller::new("alice", "Org2MSP");
        run(&mut stub, &alice, |ctx| {
            ledger.create_account(ctx).unwrap();
            workflow.order_mint(ctx, 10).unwrap();
            workflow.order_burn(ctx, 3).unwrap();
            assert!(workflow.get_mint_order(ctx).is_err());
            assert_eq!(workflow.get_burn_order(ctx).unwrap().amount, 3);
        });
    }
}
