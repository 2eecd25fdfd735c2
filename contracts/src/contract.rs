//! # Energy Market Contract
//!
//! The deployable unit: token ledger, supply-order workflow and auction
//! house behind one policy, plus [`EnergyMarketContract::invoke`], which
//! maps a function name and string arguments (what a client submits) onto
//! the typed operations and renders the result as JSON.

use gridledger_protocol::{LedgerPolicy, StoreError, TxContext};
use serde::Serialize;
use serde_json::Value;

use crate::auction::AuctionHouse;
use crate::error::{ContractError, ContractResult};
use crate::mint_burn::MintBurnWorkflow;
use crate::token_ledger::TokenLedger;

/// Function names accepted by [`EnergyMarketContract::invoke`].
pub const FUNCTIONS: &[&str] = &[
    "CreateAccount",
    "Burn",
    "Transfer",
    "TransferFrom",
    "Approve",
    "Allowance",
    "BalanceOf",
    "ClientAccountBalance",
    "ClientAccountID",
    "TotalSupply",
    "GetAccount",
    "CreateHold",
    "ExecuteHold",
    "ReturnHold",
    "OrderMint",
    "OrderBurn",
    "ApproveMint",
    "ApproveBurn",
    "RejectMint",
    "RejectBurn",
    "ExecuteMint",
    "ExecuteBurn",
    "GetMintOrder",
    "GetBurnOrder",
    "GetMintOrders",
    "GetBurnOrders",
    "CreateAuction",
    "Bid_Rev",
    "SubmitBid",
    "SubmitSealedBid",
    "RevealBid",
    "CloseAuction",
    "EndAuction",
    "CheckAuction",
    "GetAuction",
];

#[derive(Debug, Clone)]
pub struct EnergyMarketContract {
    ledger: TokenLedger,
    orders: MintBurnWorkflow,
    auctions: AuctionHouse,
}

impl EnergyMarketContract {
    pub fn new(policy: LedgerPolicy) -> Self {
        let ledger = TokenLedger::new(policy);
        Self {
            orders: MintBurnWorkflow::new(ledger.clone()),
            auctions: AuctionHouse::new(ledger.clone()),
            ledger,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        self.ledger.policy()
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn orders(&self) -> &MintBurnWorkflow {
        &self.orders
    }

    pub fn auctions(&self) -> &AuctionHouse {
        &self.auctions
    }

    /// Run `function` with client-supplied `args`.
    ///
    /// Unit results come back as `null`. Integer arguments are parsed as
    /// `i64`.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidArgument`] for an unknown function, the wrong
    /// number of arguments, or an argument that is not an integer where one
    /// is expected; otherwise whatever the operation returns.
    pub fn invoke(
        &self,
        ctx: &mut TxContext<'_>,
        function: &str,
        args: &[String],
    ) -> ContractResult<Value> {
        tracing::debug!(function, args = args.len(), tx = ctx.tx_id(), "dispatching");
        let a = Args { function, args };
        let (ledger, orders, auctions) = (&self.ledger, &self.orders, &self.auctions);

        match function {
            // -- Token ledger -------------------------------------------------
            // New supply only comes from ExecuteMint; there is no direct Mint.
            "CreateAccount" => {
                a.arity(0)?;
                unit(ledger.create_account(ctx))
            }
            "Burn" => {
                a.arity(1)?;
                unit(ledger.burn(ctx, a.int(0)?))
            }
            "Transfer" => {
                a.arity(2)?;
                unit(ledger.transfer(ctx, a.str(0), a.int(1)?))
            }
            "TransferFrom" => {
                a.arity(3)?;
                unit(ledger.transfer_from(ctx, a.str(0), a.str(1), a.int(2)?))
            }
            "Approve" => {
                a.arity(2)?;
                unit(ledger.approve(ctx, a.str(0), a.int(1)?))
            }
            "Allowance" => {
                a.arity(2)?;
                json(ledger.allowance(ctx, a.str(0), a.str(1))?)
            }
            "BalanceOf" => {
                a.arity(1)?;
                json(ledger.balance_of(ctx, a.str(0))?)
            }
            "ClientAccountBalance" => {
                a.arity(0)?;
                json(ledger.client_account_balance(ctx)?)
            }
            "ClientAccountID" => {
                a.arity(0)?;
                json(ledger.client_account_id(ctx)?)
            }
            "TotalSupply" => {
                a.arity(0)?;
                json(ledger.total_supply(ctx)?)
            }
            "GetAccount" => {
                a.arity(0)?;
                json(ledger.get_account(ctx)?)
            }
            "CreateHold" => {
                a.arity(1)?;
                unit(ledger.create_hold(ctx, a.int(0)?))
            }
            "ExecuteHold" => {
                a.arity(2)?;
                unit(ledger.execute_hold(ctx, a.str(0), a.int(1)?))
            }
            "ReturnHold" => {
                a.arity(1)?;
                unit(ledger.return_hold(ctx, a.str(0)))
            }

            // -- Supply orders ------------------------------------------------
            "OrderMint" => {
                a.arity(1)?;
                unit(orders.order_mint(ctx, a.int(0)?))
            }
            "OrderBurn" => {
                a.arity(1)?;
                unit(orders.order_burn(ctx, a.int(0)?))
            }
            "ApproveMint" => {
                a.arity(1)?;
                unit(orders.approve_mint(ctx, a.str(0)))
            }
            "ApproveBurn" => {
                a.arity(1)?;
                unit(orders.approve_burn(ctx, a.str(0)))
            }
            "RejectMint" => {
                a.arity(1)?;
                unit(orders.reject_mint(ctx, a.str(0)))
            }
            "RejectBurn" => {
                a.arity(1)?;
                unit(orders.reject_burn(ctx, a.str(0)))
            }
            "ExecuteMint" => {
                a.arity(1)?;
                unit(orders.execute_mint(ctx, a.int(0)?))
            }
            "ExecuteBurn" => {
                a.arity(1)?;
                unit(orders.execute_burn(ctx, a.int(0)?))
            }
            "GetMintOrder" => {
                a.arity(0)?;
                json(orders.get_mint_order(ctx)?)
            }
            "GetBurnOrder" => {
                a.arity(0)?;
                json(orders.get_burn_order(ctx)?)
            }
            "GetMintOrders" => {
                a.arity(0)?;
                json(orders.get_mint_orders(ctx)?)
            }
            "GetBurnOrders" => {
                a.arity(0)?;
                json(orders.get_burn_orders(ctx)?)
            }

            // -- Auctions -----------------------------------------------------
            "CreateAuction" => {
                a.arity(4)?;
                unit(auctions.create_auction(ctx, a.str(0), a.int(1)?, a.int(2)?, a.int(3)?))
            }
            "Bid_Rev" | "SubmitBid" => {
                a.arity(2)?;
                unit(auctions.submit_bid(ctx, a.str(0), a.int(1)?))
            }
            "SubmitSealedBid" => {
                a.arity(2)?;
                unit(auctions.submit_sealed_bid(ctx, a.str(0), a.str(1)))
            }
            "RevealBid" => {
                a.arity(3)?;
                unit(auctions.reveal_bid(ctx, a.str(0), a.int(1)?, a.str(2)))
            }
            "CloseAuction" => {
                a.arity(1)?;
                unit(auctions.close_auction(ctx, a.str(0)))
            }
            "EndAuction" => {
                a.arity(1)?;
                json(auctions.end_auction(ctx, a.str(0))?)
            }
            "CheckAuction" => {
                a.arity(1)?;
                json(auctions.check_auction(ctx, a.str(0))?)
            }
            "GetAuction" => {
                a.arity(1)?;
                json(auctions.get_auction(ctx, a.str(0))?)
            }

            other => Err(ContractError::InvalidArgument(format!(
                "unknown function {other:?}"
            ))),
        }
    }
}

/// Positional string arguments of one call.
struct Args<'a> {
    function: &'a str,
    args: &'a [String],
}

impl<'a> Args<'a> {
    fn arity(&self, expected: usize) -> ContractResult<()> {
        if self.args.len() != expected {
            return Err(ContractError::InvalidArgument(format!(
                "{} takes {expected} argument(s), got {}",
                self.function,
                self.args.len()
            )));
        }
        Ok(())
    }

    fn str(&self, index: usize) -> &'a str {
        self.args[index].as_str()
    }

    fn int(&self, index: usize) -> ContractResult<i64> {
        let raw = self.str(index);
        raw.trim().parse::<i64>().map_err(|_| {
            ContractError::InvalidArgument(format!(
                "{} argument {} must be an integer, got {raw:?}",
                self.function,
                index + 1
            ))
        })
    }
}

fn unit(result: ContractResult<()>) -> ContractResult<Value> {
    result.map(|()| Value::Null)
}

fn json<T: Serialize>(value: T) -> ContractResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ContractError::Store(StoreError::Serialization(e.to_string())))
}
