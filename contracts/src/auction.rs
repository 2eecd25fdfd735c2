//! # Energy Auction
//!
//! A seller offers a quantity of energy with a reserve of
//! `amount × price_per_kwh`. Bidders back every revealed bid with an escrow
//! hold on the [`TokenLedger`]; the highest revealed bid strictly above the
//! reserve wins. Ending the auction settles that escrow: the winning bid is
//! paid to the seller and every other bid goes back to its bidder.
//!
//! ## Lifecycle
//!
//! ```text
//!   CreateAuction         CloseAuction          EndAuction
//!  ──────────────► Open ──────────────► Closed ──────────────► Ended ─► (deleted)
//!                   │  ▲                  │
//!  SubmitBid ───────┘  │                  │
//!  SubmitSealedBid ────┘                  │
//!  RevealBid ─────────────── Open or Closed
//! ```
//!
//! Expiry is checked lazily: whenever a bid or a check lands on an open
//! auction whose duration has elapsed, the auction is closed and ended on
//! the spot and the call itself fails.
//!
//! ## Sealed bids
//!
//! A bidder may first commit to a price with
//! `hex(sha256("{auction_id}\n{bidder}\n{price}\n{salt}"))` and reveal it
//! later. Ending the auction fails while any commitment is unrevealed or
//! does not match its revealed bid, so a withheld higher bid cannot be
//! silently ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gridledger_protocol::config::{
    AUCTION_OBJECT_TYPE, BID_PREFIX, ENERGY_ITEM, MINT_BURN_KEY, TOTAL_SUPPLY_KEY,
};
use gridledger_protocol::storage::{composite_key, is_composite_key};
use gridledger_protocol::{StoreError, TxContext};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{require_positive, ContractError, ContractResult};
use crate::token_ledger::TokenLedger;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Open,
    Closed,
    Ended,
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionStatus::Open => write!(f, "open"),
            AuctionStatus::Closed => write!(f, "closed"),
            AuctionStatus::Ended => write!(f, "ended"),
        }
    }
}

/// A bid whose price is public and backed by a hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedBid {
    /// `bid/{auction_id}/{bidder}`
    pub key: String,
    pub item: String,
    pub price: i64,
    pub org: String,
    pub bidder: String,
    /// Present when the bid was revealed from a commitment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

/// A commitment to a bid that has not been revealed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBid {
    pub org: String,
    pub hash: String,
}

/// The auction record, stored as JSON under its auction ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub object_type: String,
    pub item: String,
    /// Quantity on offer, in kWh.
    pub amount: i64,
    pub price_per_kwh: i64,
    pub time_started: DateTime<Utc>,
    /// Duration in minutes, measured from `time_started`.
    pub time_remaining: i64,
    pub seller: String,
    /// Organizations taking part, seller's first. Each is an endorser.
    pub orgs: Vec<String>,
    pub private_bids: BTreeMap<String, SealedBid>,
    /// In submission order.
    pub revealed_bids: Vec<RevealedBid>,
    pub winner: String,
    /// Reserve until the auction ends, then the winning price.
    pub price: i64,
    pub status: AuctionStatus,
}

impl Auction {
    /// Whether the auction's duration has run out at `now`. Only whole
    /// elapsed minutes count.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let elapsed = (now - self.time_started).num_minutes();
        elapsed >= self.time_remaining
    }

    fn revealed(&self, key: &str) -> Option<&RevealedBid> {
        self.revealed_bids.iter().find(|bid| bid.key == key)
    }

    fn join(&mut self, org: &str) -> bool {
        if self.orgs.iter().any(|o| o == org) {
            return false;
        }
        self.orgs.push(org.to_string());
        true
    }
}

/// Commitment a sealed bid must match when revealed.
pub fn bid_commitment(auction_id: &str, bidder: &str, price: i64, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{auction_id}\n{bidder}\n{price}\n{salt}").as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// AuctionHouse
// ---------------------------------------------------------------------------

/// Auction operations. Escrow goes through the wrapped ledger.
#[derive(Debug, Clone)]
pub struct AuctionHouse {
    ledger: TokenLedger,
}

impl AuctionHouse {
    pub fn new(ledger: TokenLedger) -> Self {
        Self { ledger }
    }

    /// Open a new auction with the caller as seller.
    ///
    /// # Errors
    ///
    /// - [`ContractError::InvalidArgument`] for a non-positive price or
    ///   amount, a negative duration, an unusable ID, or a reserve that
    ///   overflows.
    /// - [`ContractError::AlreadyExists`] if the ID is already a key.
    pub fn create_auction(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        price_per_kwh: i64,
        amount: i64,
        time_remaining: i64,
    ) -> ContractResult<()> {
        validate_auction_id(auction_id)?;
        require_positive("price per kWh", price_per_kwh)?;
        require_positive("auction amount", amount)?;
        if time_remaining < 0 {
            return Err(ContractError::InvalidArgument(format!(
                "auction duration cannot be negative, got {time_remaining}"
            )));
        }
        let reserve = amount.checked_mul(price_per_kwh).ok_or_else(|| {
            ContractError::InvalidArgument(format!("reserve overflow: {amount} × {price_per_kwh}"))
        })?;
        if ctx.get_state(auction_id)?.is_some() {
            return Err(ContractError::AlreadyExists(format!(
                "auction {auction_id} already exists"
            )));
        }

        let seller_org = ctx.caller_org().to_string();
        let auction = Auction {
            object_type: AUCTION_OBJECT_TYPE.to_string(),
            item: ENERGY_ITEM.to_string(),
            amount,
            price_per_kwh,
            time_started: ctx.timestamp(),
            time_remaining,
            seller: ctx.caller_id().to_string(),
            orgs: vec![seller_org.clone()],
            private_bids: BTreeMap::new(),
            revealed_bids: Vec::new(),
            winner: String::new(),
            price: reserve,
            status: AuctionStatus::Open,
        };
        ctx.put_json(auction_id, &auction)?;
        ctx.set_endorsing_orgs(auction_id, &[&seller_org])?;

        tracing::info!(
            auction = auction_id,
            seller = %auction.seller,
            reserve,
            minutes = time_remaining,
            "auction created"
        );
        Ok(())
    }

    /// Place a revealed bid of `amount` and escrow it.
    pub fn submit_bid(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        amount: i64,
    ) -> ContractResult<()> {
        require_positive("bid amount", amount)?;
        let mut auction = self.load(ctx, auction_id)?;
        if auction.status != AuctionStatus::Open {
            return Err(ContractError::FailedPrecondition(format!(
                "cannot bid on {} auction {auction_id}",
                auction.status
            )));
        }
        self.ensure_running(ctx, auction_id, &auction, "time is up")?;

        let key = bid_key(auction_id, ctx.caller_id())?;
        if auction.private_bids.contains_key(&key) {
            return Err(ContractError::FailedPrecondition(format!(
                "{} committed a sealed bid on {auction_id}; reveal it instead",
                ctx.caller_id()
            )));
        }
        self.place_revealed(ctx, auction_id, &mut auction, key, amount, None)
    }

    /// Commit to a bid without revealing its price. No funds are held
    /// until the bid is revealed.
    pub fn submit_sealed_bid(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        commitment: &str,
    ) -> ContractResult<()> {
        if commitment.len() != 64 || hex::decode(commitment).is_err() {
            return Err(ContractError::InvalidArgument(
                "bid commitment must be a hex-encoded SHA-256 digest".to_string(),
            ));
        }
        let mut auction = self.load(ctx, auction_id)?;
        if auction.status != AuctionStatus::Open {
            return Err(ContractError::FailedPrecondition(format!(
                "cannot bid on {} auction {auction_id}",
                auction.status
            )));
        }
        self.ensure_running(ctx, auction_id, &auction, "time is up")?;

        let bidder = ctx.caller_id().to_string();
        let org = ctx.caller_org().to_string();
        let key = bid_key(auction_id, &bidder)?;
        if auction.private_bids.contains_key(&key) || auction.revealed(&key).is_some() {
            return Err(ContractError::AlreadyExists(format!(
                "{bidder} already bid on {auction_id}"
            )));
        }

        auction.private_bids.insert(
            key,
            SealedBid {
                org: org.clone(),
                hash: commitment.to_lowercase(),
            },
        );
        self.add_participant(ctx, auction_id, &mut auction, &org)?;
        ctx.put_json(auction_id, &auction)?;

        tracing::info!(auction = auction_id, bidder = %bidder, "sealed bid submitted");
        Ok(())
    }

    /// Reveal a previously sealed bid and escrow it.
    pub fn reveal_bid(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        price: i64,
        salt: &str,
    ) -> ContractResult<()> {
        require_positive("bid amount", price)?;
        let mut auction = self.load(ctx, auction_id)?;
        match auction.status {
            AuctionStatus::Open => self.ensure_running(ctx, auction_id, &auction, "time is up")?,
            AuctionStatus::Closed => {}
            AuctionStatus::Ended => {
                return Err(ContractError::FailedPrecondition(format!(
                    "auction {auction_id} has ended"
                )))
            }
        }

        let bidder = ctx.caller_id().to_string();
        let key = bid_key(auction_id, &bidder)?;
        let sealed = auction.private_bids.get(&key).ok_or_else(|| {
            ContractError::NotFound(format!("no sealed bid from {bidder} on {auction_id}"))
        })?;
        if bid_commitment(auction_id, &bidder, price, salt) != sealed.hash {
            return Err(ContractError::FailedPrecondition(format!(
                "revealed bid from {bidder} does not match its commitment"
            )));
        }
        self.place_revealed(ctx, auction_id, &mut auction, key, price, Some(salt.to_string()))
    }

    /// Seller-only transition from `open` to `closed`.
    pub fn close_auction(&self, ctx: &mut TxContext<'_>, auction_id: &str) -> ContractResult<()> {
        self.close(ctx, auction_id, true)
    }

    /// Seller-only transition from `closed` to `ended`. Picks the winner,
    /// checks every sealed bid was honestly revealed, and retires the record.
    /// Returns the terminal snapshot since the record is gone afterwards.
    pub fn end_auction(&self, ctx: &mut TxContext<'_>, auction_id: &str) -> ContractResult<Auction> {
        self.finalize(ctx, auction_id, true)
    }

    /// Approver-only. Returns the auction while it is still running;
    /// otherwise closes and ends it and reports that.
    pub fn check_auction(&self, ctx: &mut TxContext<'_>, auction_id: &str) -> ContractResult<Auction> {
        let approver = self.ledger.policy().approver_org.as_str();
        if ctx.caller_org() != approver {
            return Err(ContractError::PermissionDenied(format!(
                "organization {} is not authorized to check auctions",
                ctx.caller_org()
            )));
        }
        let auction = self.load(ctx, auction_id)?;
        if auction.status != AuctionStatus::Open {
            return Err(ContractError::FailedPrecondition(format!(
                "auction {auction_id} is closed or ended"
            )));
        }
        self.ensure_running(ctx, auction_id, &auction, "auction closed and ended")?;
        Ok(auction)
    }

    /// Current record, whatever its status.
    pub fn get_auction(&self, ctx: &TxContext<'_>, auction_id: &str) -> ContractResult<Auction> {
        self.load(ctx, auction_id)
    }

    // -- Internals ----------------------------------------------------------

    fn load(&self, ctx: &TxContext<'_>, auction_id: &str) -> ContractResult<Auction> {
        let not_found = || ContractError::NotFound(format!("auction {auction_id} not found"));
        if validate_auction_id(auction_id).is_err() {
            return Err(not_found());
        }
        match ctx.get_json::<Auction>(auction_id) {
            Ok(Some(auction)) if auction.object_type == AUCTION_OBJECT_TYPE => Ok(auction),
            Ok(_) | Err(StoreError::Serialization(_)) => Err(not_found()),
            Err(err) => Err(err.into()),
        }
    }

    /// Fail with `message` after expiring the auction if its time is up.
    fn ensure_running(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        auction: &Auction,
        message: &str,
    ) -> ContractResult<()> {
        if !auction.is_expired(ctx.timestamp()) {
            return Ok(());
        }
        if let Err(err) = self.close(ctx, auction_id, false) {
            tracing::warn!(auction = auction_id, error = %err, "auto-close failed");
        }
        if let Err(err) = self.finalize(ctx, auction_id, false) {
            tracing::warn!(auction = auction_id, error = %err, "auto-end failed");
        }
        Err(ContractError::FailedPrecondition(format!(
            "{message}: auction {auction_id}"
        )))
    }

    fn place_revealed(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        auction: &mut Auction,
        key: String,
        price: i64,
        salt: Option<String>,
    ) -> ContractResult<()> {
        let bidder = ctx.caller_id().to_string();
        let org = ctx.caller_org().to_string();
        if auction.revealed(&key).is_some() {
            return Err(ContractError::AlreadyExists(format!(
                "{bidder} already has a revealed bid on {auction_id}"
            )));
        }

        let balance = self.ledger.client_account_balance(ctx)?;
        if balance < price {
            return Err(ContractError::FailedPrecondition(format!(
                "balance {balance} is less than bid {price}"
            )));
        }

        auction.revealed_bids.push(RevealedBid {
            key,
            item: auction.item.clone(),
            price,
            org: org.clone(),
            bidder: bidder.clone(),
            salt,
        });
        self.add_participant(ctx, auction_id, auction, &org)?;
        ctx.put_json(auction_id, &*auction)?;
        self.ledger.create_hold(ctx, price)?;

        tracing::info!(auction = auction_id, bidder = %bidder, price, "bid revealed");
        Ok(())
    }

    fn add_participant(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        auction: &mut Auction,
        org: &str,
    ) -> ContractResult<()> {
        if auction.join(org) {
            ctx.add_endorsing_orgs(auction_id, &[org])?;
            tracing::debug!(auction = auction_id, org, "organization joined auction");
        }
        Ok(())
    }

    fn close(&self, ctx: &mut TxContext<'_>, auction_id: &str, seller_only: bool) -> ContractResult<()> {
        let mut auction = self.load(ctx, auction_id)?;
        if seller_only {
            require_seller(ctx, &auction, "closed")?;
        }
        if auction.status != AuctionStatus::Open {
            return Err(ContractError::FailedPrecondition(format!(
                "cannot close auction {auction_id}: it is {}",
                auction.status
            )));
        }
        auction.status = AuctionStatus::Closed;
        ctx.put_json(auction_id, &auction)?;

        tracing::info!(auction = auction_id, "auction closed");
        Ok(())
    }

    fn finalize(
        &self,
        ctx: &mut TxContext<'_>,
        auction_id: &str,
        seller_only: bool,
    ) -> ContractResult<Auction> {
        let mut auction = self.load(ctx, auction_id)?;
        if seller_only {
            require_seller(ctx, &auction, "ended")?;
        }
        if auction.status != AuctionStatus::Closed {
            return Err(ContractError::FailedPrecondition(format!(
                "can only end a closed auction, {auction_id} is {}",
                auction.status
            )));
        }
        if auction.revealed_bids.is_empty() {
            return Err(ContractError::FailedPrecondition(format!(
                "no bids have been revealed on {auction_id}"
            )));
        }

        for bid in &auction.revealed_bids {
            if bid.price > auction.price {
                auction.winner = bid.bidder.clone();
                auction.price = bid.price;
            }
        }
        verify_sealed_bids(auction_id, &auction)?;
        self.settle_bids(ctx, &auction)?;

        auction.status = AuctionStatus::Ended;
        ctx.put_json(auction_id, &auction)?;
        ctx.del_state(auction_id)?;

        tracing::info!(
            auction = auction_id,
            winner = %auction.winner,
            price = auction.price,
            "auction ended"
        );
        Ok(auction)
    }

    /// Pay the winning bid to the seller and release every other bid's
    /// escrow. Each revealed bid holds exactly its price.
    fn settle_bids(&self, ctx: &mut TxContext<'_>, auction: &Auction) -> ContractResult<()> {
        for bid in &auction.revealed_bids {
            let won = !auction.winner.is_empty() && bid.bidder == auction.winner;
            if won && bid.bidder != auction.seller {
                self.ledger
                    .settle_hold(ctx, &bid.bidder, &auction.seller, bid.price)?;
            } else {
                self.ledger.release_hold(ctx, &bid.bidder, bid.price)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bid_key(auction_id: &str, bidder: &str) -> ContractResult<String> {
    Ok(composite_key(BID_PREFIX, &[auction_id, bidder])?)
}

/// Auction records live at their plain ID, next to the singleton records.
fn validate_auction_id(auction_id: &str) -> ContractResult<()> {
    if auction_id.is_empty()
        || is_composite_key(auction_id)
        || auction_id == TOTAL_SUPPLY_KEY
        || auction_id == MINT_BURN_KEY
    {
        return Err(ContractError::InvalidArgument(format!(
            "{auction_id:?} cannot be used as an auction ID"
        )));
    }
    Ok(())
}

fn require_seller(ctx: &TxContext<'_>, auction: &Auction, action: &str) -> ContractResult<()> {
    if auction.seller != ctx.caller_id() {
        return Err(ContractError::PermissionDenied(format!(
            "auction can only be {action} by its seller"
        )));
    }
    Ok(())
}

/// Every sealed bid must be revealed under the same key with a price and
/// salt that reproduce its commitment.
fn verify_sealed_bids(auction_id: &str, auction: &Auction) -> ContractResult<()> {
    for (key, sealed) in &auction.private_bids {
        let honest = auction.revealed(key).is_some_and(|bid| {
            bid.salt.as_deref().is_some_and(|salt| {
                bid_commitment(auction_id, &bid.bidder, bid.price, salt) == sealed.hash
            })
        });
        if !honest {
            return Err(ContractError::FailedPrecondition(format!(
                "sealed bid from organization {} was not revealed",
                sealed.org
            )));
        }
    }
    Ok(())
}
