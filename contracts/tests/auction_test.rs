//! Integration tests for the energy auction.
//!
//! The first group runs on the in-memory `MockStub`. The second runs every
//! call as a real `Invocation` against a sled `LedgerDB`, committing only on
//! success, which is how the node binary executes them.

use chrono::{Duration, Utc};
use gridledger_contracts::{
    bid_commitment, AuctionStatus, ContractError, EnergyMarketContract, ErrorKind,
};
use gridledger_protocol::{Caller, Invocation, LedgerDB, LedgerPolicy, MockStub, TxContext};
use serde_json::{json, Value};

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn mock_call(
    contract: &EnergyMarketContract,
    stub: &mut MockStub,
    who: &Caller,
    function: &str,
    raw: &[&str],
) -> Result<Value, ContractError> {
    stub.next_tx();
    let mut ctx = TxContext::new(stub, who);
    contract.invoke(&mut ctx, function, &args(raw))
}

/// Open an account for `who` and issue `amount` through an approved order.
fn mock_fund(contract: &EnergyMarketContract, stub: &mut MockStub, who: &Caller, amount: &str) {
    let bank = Caller::new("bank", "Org1MSP");
    mock_call(contract, stub, who, "CreateAccount", &[]).unwrap();
    mock_call(contract, stub, who, "OrderMint", &[amount]).unwrap();
    mock_call(contract, stub, &bank, "ApproveMint", &[who.id.as_str()]).unwrap();
    mock_call(contract, stub, who, "ExecuteMint", &[amount]).unwrap();
}

// ---------------------------------------------------------------------------
// MockStub scenarios
// ---------------------------------------------------------------------------

#[test]
fn two_bidders_highest_wins_and_record_is_retired() {
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let mut stub = MockStub::new();
    let seller = Caller::new("seller", "Org3MSP");
    let low = Caller::new("low", "Org2MSP");
    let high = Caller::new("high", "Org4MSP");

    for who in [&low, &high] {
        mock_fund(&contract, &mut stub, who, "100");
    }

    mock_call(&contract, &mut stub, &seller, "CreateAuction", &["a1", "5", "10", "60"]).unwrap();
    let created = mock_call(&contract, &mut stub, &seller, "GetAuction", &["a1"]).unwrap();
    assert_eq!(created["price"], 50);
    assert_eq!(created["status"], "open");

    mock_call(&contract, &mut stub, &low, "SubmitBid", &["a1", "60"]).unwrap();
    mock_call(&contract, &mut stub, &high, "SubmitBid", &["a1", "80"]).unwrap();

    mock_call(&contract, &mut stub, &seller, "CloseAuction", &["a1"]).unwrap();
    let closed = mock_call(&contract, &mut stub, &seller, "GetAuction", &["a1"]).unwrap();
    assert_eq!(closed["status"], "closed");

    let ended = mock_call(&contract, &mut stub, &seller, "EndAuction", &["a1"]).unwrap();
    assert_eq!(ended["winner"], "high");
    assert_eq!(ended["price"], 80);
    assert_eq!(ended["status"], "ended");

    let gone = mock_call(&contract, &mut stub, &seller, "GetAuction", &["a1"]).unwrap_err();
    assert_eq!(gone.kind(), ErrorKind::NotFound);

    // Bidding on a retired auction fails.
    let late = mock_call(&contract, &mut stub, &low, "SubmitBid", &["a1", "90"]).unwrap_err();
    assert_eq!(late.kind(), ErrorKind::NotFound);
}

#[test]
fn underfunded_bid_fails_without_side_effects() {
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let mut stub = MockStub::new();
    let seller = Caller::new("seller", "Org3MSP");
    let poor = Caller::new("poor", "Org2MSP");

    mock_fund(&contract, &mut stub, &poor, "5");
    mock_call(&contract, &mut stub, &seller, "CreateAuction", &["a1", "5", "10", "60"]).unwrap();
    let before = stub.state().clone();

    let err = mock_call(&contract, &mut stub, &poor, "SubmitBid", &["a1", "10"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert_eq!(stub.state(), &before);

    let account = mock_call(&contract, &mut stub, &poor, "GetAccount", &[]).unwrap();
    assert_eq!(account["on_hold"], 0);
}

#[test]
fn no_bid_above_reserve_ends_without_winner() {
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let mut stub = MockStub::new();
    let seller = Caller::new("seller", "Org3MSP");
    let bidder = Caller::new("bidder", "Org2MSP");

    mock_fund(&contract, &mut stub, &bidder, "100");
    mock_call(&contract, &mut stub, &seller, "CreateAuction", &["a1", "5", "10", "60"]).unwrap();
    mock_call(&contract, &mut stub, &bidder, "SubmitBid", &["a1", "50"]).unwrap();
    mock_call(&contract, &mut stub, &seller, "CloseAuction", &["a1"]).unwrap();

    let ended = mock_call(&contract, &mut stub, &seller, "EndAuction", &["a1"]).unwrap();
    assert_eq!(ended["winner"], "");
    assert_eq!(ended["price"], 50);
}

#[test]
fn winner_pays_and_losers_are_refunded() {
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let mut stub = MockStub::new();
    let seller = Caller::new("seller", "Org3MSP");
    let low = Caller::new("low", "Org2MSP");
    let high = Caller::new("high", "Org2MSP");

    mock_call(&contract, &mut stub, &seller, "CreateAccount", &[]).unwrap();
    for who in [&low, &high] {
        mock_fund(&contract, &mut stub, who, "100");
    }
    mock_call(&contract, &mut stub, &seller, "CreateAuction", &["a1", "1", "10", "60"]).unwrap();
    mock_call(&contract, &mut stub, &low, "SubmitBid", &["a1", "30"]).unwrap();
    mock_call(&contract, &mut stub, &high, "SubmitBid", &["a1", "45"]).unwrap();
    mock_call(&contract, &mut stub, &seller, "CloseAuction", &["a1"]).unwrap();
    let ended = mock_call(&contract, &mut stub, &seller, "EndAuction", &["a1"]).unwrap();

    assert_eq!(ended["price"], 45);

    // Ending the auction settled both holds.
    for who in [&low, &high] {
        let account = mock_call(&contract, &mut stub, who, "GetAccount", &[]).unwrap();
        assert_eq!(account["on_hold"], 0);
    }
    let stray = mock_call(&contract, &mut stub, &seller, "ReturnHold", &["low"]).unwrap_err();
    assert_eq!(stray.kind(), ErrorKind::PermissionDenied);

    let balance = |stub: &mut MockStub, who: &str| {
        mock_call(&contract, stub, &seller, "BalanceOf", &[who]).unwrap()
    };
    assert_eq!(balance(&mut stub, "seller"), json!(45));
    assert_eq!(balance(&mut stub, "high"), json!(55));
    assert_eq!(balance(&mut stub, "low"), json!(100));
    assert_eq!(
        mock_call(&contract, &mut stub, &seller, "TotalSupply", &[]).unwrap(),
        json!(200)
    );
}

#[test]
fn transfer_to_an_auction_id_leaves_the_auction_intact() {
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let mut stub = MockStub::new();
    let seller = Caller::new("seller", "Org3MSP");
    let alice = Caller::new("alice", "Org2MSP");
    let mallory = Caller::new("mallory", "Org4MSP");

    mock_fund(&contract, &mut stub, &alice, "100");
    mock_call(&contract, &mut stub, &mallory, "CreateAccount", &[]).unwrap();
    mock_call(&contract, &mut stub, &seller, "CreateAuction", &["a1", "1", "10", "60"]).unwrap();
    mock_call(&contract, &mut stub, &alice, "SubmitBid", &["a1", "30"]).unwrap();

    mock_call(&contract, &mut stub, &mallory, "Transfer", &["a1", "0"]).unwrap();
    assert_eq!(
        mock_call(&contract, &mut stub, &mallory, "BalanceOf", &["a1"]).unwrap(),
        json!(0)
    );

    let auction = mock_call(&contract, &mut stub, &seller, "GetAuction", &["a1"]).unwrap();
    assert_eq!(auction["status"], "open");
    assert_eq!(auction["revealed_bids"].as_array().map(Vec::len), Some(1));
    mock_call(&contract, &mut stub, &seller, "CloseAuction", &["a1"]).unwrap();
    let ended = mock_call(&contract, &mut stub, &seller, "EndAuction", &["a1"]).unwrap();
    assert_eq!(ended["winner"], "alice");
}

#[test]
fn sealed_bids_through_dispatch() {
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let mut stub = MockStub::new();
    let seller = Caller::new("seller", "Org3MSP");
    let alice = Caller::new("alice", "Org2MSP");

    mock_fund(&contract, &mut stub, &alice, "100");
    mock_call(&contract, &mut stub, &seller, "CreateAuction", &["a1", "2", "10", "60"]).unwrap();

    let hash = bid_commitment("a1", "alice", 75, "nonce-1");
    mock_call(&contract, &mut stub, &alice, "SubmitSealedBid", &["a1", hash.as_str()]).unwrap();
    // Sealing holds nothing.
    let account = mock_call(&contract, &mut stub, &alice, "GetAccount", &[]).unwrap();
    assert_eq!(account["on_hold"], 0);

    mock_call(&contract, &mut stub, &seller, "CloseAuction", &["a1"]).unwrap();
    mock_call(&contract, &mut stub, &alice, "RevealBid", &["a1", "75", "nonce-1"]).unwrap();
    let account = mock_call(&contract, &mut stub, &alice, "GetAccount", &[]).unwrap();
    assert_eq!(account["on_hold"], 75);

    let ended = mock_call(&contract, &mut stub, &seller, "EndAuction", &["a1"]).unwrap();
    assert_eq!(ended["winner"], "alice");
}

// ---------------------------------------------------------------------------
// LedgerDB scenarios
// ---------------------------------------------------------------------------

/// Run one invocation against `db` and commit it only if it succeeded.
fn db_call(
    contract: &EnergyMarketContract,
    db: &LedgerDB,
    at: chrono::DateTime<Utc>,
    who: &Caller,
    function: &str,
    raw: &[&str],
) -> Result<Value, ContractError> {
    let tx_id = format!("tx-{}", db.tx_count() + 1);
    let mut invocation = Invocation::new(db, tx_id, at);
    let result = {
        let mut ctx = TxContext::new(&mut invocation, who);
        contract.invoke(&mut ctx, function, &args(raw))
    };
    if result.is_ok() {
        invocation.commit()?;
    }
    result
}

fn db_fund(
    contract: &EnergyMarketContract,
    db: &LedgerDB,
    at: chrono::DateTime<Utc>,
    who: &Caller,
    amount: &str,
) {
    let bank = Caller::new("bank", "Org1MSP");
    db_call(contract, db, at, who, "CreateAccount", &[]).unwrap();
    db_call(contract, db, at, who, "OrderMint", &[amount]).unwrap();
    db_call(contract, db, at, &bank, "ApproveMint", &[who.id.as_str()]).unwrap();
    db_call(contract, db, at, who, "ExecuteMint", &[amount]).unwrap();
}

#[test]
fn persisted_auction_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let db = LedgerDB::open(dir.path()).unwrap();
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let now = Utc::now();
    let seller = Caller::new("seller", "Org3MSP");
    let bidder = Caller::new("bidder", "Org2MSP");

    db_fund(&contract, &db, now, &bidder, "100");
    db_call(&contract, &db, now, &seller, "CreateAuction", &["a1", "1", "10", "60"]).unwrap();
    db_call(&contract, &db, now, &bidder, "SubmitBid", &["a1", "20"]).unwrap();

    assert_eq!(
        db.endorsement_policy("a1").unwrap().list_orgs(),
        vec!["Org2MSP", "Org3MSP"]
    );

    // A failed call leaves no trace.
    let txs = db.tx_count();
    let err = db_call(&contract, &db, now, &bidder, "SubmitBid", &["a1", "20"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(db.tx_count(), txs);

    db_call(&contract, &db, now, &seller, "CloseAuction", &["a1"]).unwrap();
    let ended = db_call(&contract, &db, now, &seller, "EndAuction", &["a1"]).unwrap();
    assert_eq!(ended["winner"], "bidder");
    assert!(db.get("a1").unwrap().is_none());

    // The winning price moved from the bidder's escrow to the seller.
    let paid = db_call(&contract, &db, now, &seller, "ClientAccountBalance", &[]).unwrap();
    assert_eq!(paid, json!(20));
    let account = db_call(&contract, &db, now, &bidder, "GetAccount", &[]).unwrap();
    assert_eq!((account["active"].clone(), account["on_hold"].clone()), (json!(80), json!(0)));
}

#[test]
fn expiry_cleanup_is_rolled_back_with_the_failing_call() {
    let db = LedgerDB::open_temporary().unwrap();
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let start = Utc::now();
    let seller = Caller::new("seller", "Org3MSP");
    let bidder = Caller::new("bidder", "Org2MSP");
    let bank = Caller::new("bank", "Org1MSP");

    db_fund(&contract, &db, start, &bidder, "100");
    db_call(&contract, &db, start, &seller, "CreateAuction", &["a1", "1", "10", "5"]).unwrap();
    db_call(&contract, &db, start, &bidder, "SubmitBid", &["a1", "20"]).unwrap();

    let later = start + Duration::minutes(5);
    let err = db_call(&contract, &db, later, &bank, "CheckAuction", &["a1"]).unwrap_err();
    assert!(err.to_string().contains("auction closed and ended"));

    // The stored record still says open; every path re-derives expiry.
    let stored = db_call(&contract, &db, later, &seller, "GetAuction", &["a1"]).unwrap();
    assert_eq!(stored["status"], "open");
    let bid = db_call(&contract, &db, later, &bidder, "SubmitBid", &["a1", "30"]).unwrap_err();
    assert_eq!(bid.kind(), ErrorKind::FailedPrecondition);

    // The seller can still wind it down explicitly.
    db_call(&contract, &db, later, &seller, "CloseAuction", &["a1"]).unwrap();
    let ended = db_call(&contract, &db, later, &seller, "EndAuction", &["a1"]).unwrap();
    let status: AuctionStatus = serde_json::from_value(ended["status"].clone()).unwrap();
    assert_eq!(status, AuctionStatus::Ended);
}

#[test]
fn committed_events_are_logged() {
    let db = LedgerDB::open_temporary().unwrap();
    let contract = EnergyMarketContract::new(LedgerPolicy::default());
    let now = Utc::now();
    let alice = Caller::new("alice", "Org2MSP");

    db_fund(&contract, &db, now, &alice, "10");
    db_call(&contract, &db, now, &alice, "Approve", &["bob", "4"]).unwrap();

    let log = db.event_log(10).unwrap();
    let names: Vec<&str> = log.iter().map(|e| e.event.name.as_str()).collect();
    assert_eq!(names, vec!["Transfer", "Approval"]);
}
