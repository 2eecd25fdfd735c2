//! Subcommand implementations. Each returns its result instead of printing
//! so `main` owns stdout and the tests can inspect the outcome.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use gridledger_contracts::EnergyMarketContract;
use gridledger_protocol::config::POLICY_FILE_NAME;
use gridledger_protocol::storage::LoggedEvent;
use gridledger_protocol::{Caller, Invocation, LedgerDB, LedgerPolicy, TxContext};

use crate::cli::{EventsArgs, InitArgs, InvokeArgs};

/// Subdirectory of the data directory holding the sled database.
const DB_DIR: &str = "db";

/// What `init` produced.
#[derive(Debug, Serialize)]
pub struct InitReport {
    pub data_dir: PathBuf,
    pub policy_file: PathBuf,
    pub policy: LedgerPolicy,
    pub schema_version: Option<u32>,
}

/// One line of `events` output.
#[derive(Debug, Serialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub tx_id: String,
    pub timestamp: String,
    pub name: String,
    /// Decoded JSON payload, or the raw bytes as hex if it is not JSON.
    pub payload: Value,
}

impl From<LoggedEvent> for EventRecord {
    fn from(logged: LoggedEvent) -> Self {
        let payload = serde_json::from_slice(&logged.event.payload)
            .unwrap_or_else(|_| Value::String(hex::encode(&logged.event.payload)));
        Self {
            sequence: logged.sequence,
            tx_id: logged.tx_id,
            timestamp: logged.timestamp.to_rfc3339(),
            name: logged.event.name,
            payload,
        }
    }
}

/// Create the data directory, write its policy file, and initialize the
/// world state.
pub fn init(args: &InitArgs) -> Result<InitReport> {
    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing data directory");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let policy_file = data_dir.join(POLICY_FILE_NAME);
    if policy_file.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            policy_file.display()
        ));
    }

    let mut policy = LedgerPolicy::default();
    if let Some(org) = &args.approver_org {
        policy.approver_org = org.clone();
    }
    if let Some(org) = &args.burner_org {
        policy.burner_org = org.clone();
    }
    policy.validate().context("refusing to write an invalid policy")?;
    policy
        .save(&policy_file)
        .with_context(|| format!("failed to write policy to {}", policy_file.display()))?;

    let db = open_db(data_dir)?;
    let schema_version = db.schema_version().context("failed to read schema version")?;

    tracing::info!(
        policy_file = %policy_file.display(),
        approver = %policy.approver_org,
        burner = %policy.burner_org,
        "data directory initialized"
    );

    Ok(InitReport {
        data_dir: data_dir.clone(),
        policy_file,
        policy,
        schema_version,
    })
}

/// Run one contract function. Commits the write set only if the function
/// succeeded; a failure leaves the world state untouched.
pub fn invoke(args: &InvokeArgs) -> Result<Value> {
    let policy = load_policy(&args.data_dir, args.policy.as_deref())?;
    let db = open_db(&args.data_dir)?;
    let contract = EnergyMarketContract::new(policy);
    let caller = Caller::new(args.caller.as_str(), args.org.as_str());

    let tx_id = args
        .tx_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if db.is_committed(&tx_id)? {
        return Err(anyhow!("transaction {tx_id} was already committed"));
    }
    let timestamp = args.at.unwrap_or_else(Utc::now);

    tracing::info!(
        tx_id = %tx_id,
        function = %args.function,
        caller = %caller.id,
        org = %caller.msp_id,
        "invoking"
    );

    let mut invocation = Invocation::new(&db, tx_id.clone(), timestamp);
    let outcome = {
        let mut ctx = TxContext::new(&mut invocation, &caller);
        contract.invoke(&mut ctx, &args.function, &args.args)
    };

    match outcome {
        Ok(value) => {
            invocation
                .commit()
                .with_context(|| format!("failed to commit transaction {tx_id}"))?;
            Ok(value)
        }
        Err(err) => {
            let kind = err.kind();
            tracing::warn!(tx_id = %tx_id, %kind, error = %err, "invocation failed, nothing committed");
            Err(anyhow::Error::new(err).context(format!("{} failed ({kind})", args.function)))
        }
    }
}

/// Committed events, oldest first.
pub fn events(args: &EventsArgs) -> Result<Vec<EventRecord>> {
    let db = open_db(&args.data_dir)?;
    let logged = match &args.tx_id {
        Some(tx_id) => db.events_for(tx_id)?,
        None => db.event_log(args.limit)?,
    };
    Ok(logged.into_iter().map(EventRecord::from).collect())
}

fn open_db(data_dir: &Path) -> Result<LedgerDB> {
    let db_path = data_dir.join(DB_DIR);
    LedgerDB::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))
}

/// Explicit policy file, else the data directory's, else the defaults.
fn load_policy(data_dir: &Path, explicit: Option<&Path>) -> Result<LedgerPolicy> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = data_dir.join(POLICY_FILE_NAME);
            if !default.exists() {
                tracing::warn!(
                    data_dir = %data_dir.display(),
                    "no policy file found, using the default policy"
                );
                return Ok(LedgerPolicy::default());
            }
            default
        }
    };
    LedgerPolicy::load(&path).with_context(|| format!("failed to load policy from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn invoke_args(dir: &Path, caller: &str, org: &str, function: &str, args: &[&str]) -> InvokeArgs {
        InvokeArgs {
            data_dir: dir.to_path_buf(),
            policy: None,
            caller: caller.to_string(),
            org: org.to_string(),
            tx_id: None,
            at: None,
            function: function.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn init_args(dir: &Path) -> InitArgs {
        InitArgs {
            data_dir: dir.to_path_buf(),
            approver_org: None,
            burner_org: None,
            force: false,
        }
    }

    #[test]
    fn init_writes_policy_once() {
        let dir = tempfile::tempdir().unwrap();
        let report = init(&init_args(dir.path())).unwrap();
        assert!(report.policy_file.exists());
        assert_eq!(report.policy, LedgerPolicy::default());
        assert!(init(&init_args(dir.path())).is_err());

        let mut forced = init_args(dir.path());
        forced.force = true;
        forced.approver_org = Some("BankMSP".into());
        let report = init(&forced).unwrap();
        assert_eq!(LedgerPolicy::load(&report.policy_file).unwrap().approver_org, "BankMSP");
    }

    #[test]
    fn successful_invocations_persist_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        init(&init_args(dir.path())).unwrap();

        invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "CreateAccount", &[])).unwrap();
        invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "OrderMint", &["40"])).unwrap();
        invoke(&invoke_args(dir.path(), "bank", "Org1MSP", "ApproveMint", &["alice"])).unwrap();
        invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "ExecuteMint", &["40"])).unwrap();
        let balance =
            invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "ClientAccountBalance", &[])).unwrap();
        assert_eq!(balance, serde_json::json!(40));
    }

    #[test]
    fn failed_invocation_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "CreateAccount", &[])).unwrap();

        let err = invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "Transfer", &["bob", "5"]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("FailedPrecondition"));

        let bob = invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "BalanceOf", &["bob"]));
        assert!(bob.is_err());
    }

    #[test]
    fn duplicate_tx_id_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = invoke_args(dir.path(), "alice", "Org2MSP", "CreateAccount", &[]);
        args.tx_id = Some("fixed".into());
        invoke(&args).unwrap();

        let mut again = invoke_args(dir.path(), "bob", "Org2MSP", "CreateAccount", &[]);
        again.tx_id = Some("fixed".into());
        assert!(invoke(&again).is_err());
    }

    #[test]
    fn explicit_timestamp_drives_auction_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let start: DateTime<Utc> = "2025-06-01T12:00:00Z".parse().unwrap();

        let mut create = invoke_args(dir.path(), "seller", "Org3MSP", "CreateAuction", &["a1", "1", "1", "10"]);
        create.at = Some(start);
        invoke(&create).unwrap();

        let mut check = invoke_args(dir.path(), "bank", "Org1MSP", "CheckAuction", &["a1"]);
        check.at = Some(start + Duration::minutes(9));
        assert_eq!(invoke(&check).unwrap()["status"], "open");

        check.at = Some(start + Duration::minutes(10));
        let err = invoke(&check).unwrap_err();
        assert!(format!("{err:#}").contains("auction closed and ended"));
    }

    #[test]
    fn events_lists_committed_notifications() {
        let dir = tempfile::tempdir().unwrap();
        invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "CreateAccount", &[])).unwrap();
        invoke(&invoke_args(dir.path(), "alice", "Org2MSP", "OrderMint", &["9"])).unwrap();
        invoke(&invoke_args(dir.path(), "bank", "Org1MSP", "ApproveMint", &["alice"])).unwrap();
        let mut mint = invoke_args(dir.path(), "alice", "Org2MSP", "ExecuteMint", &["9"]);
        mint.tx_id = Some("mint-1".into());
        invoke(&mint).unwrap();

        let all = events(&EventsArgs {
            data_dir: dir.path().to_path_buf(),
            limit: 10,
            tx_id: None,
        })
        .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Transfer");
        assert_eq!(all[0].payload["value"], 9);

        let by_tx = events(&EventsArgs {
            data_dir: dir.path().to_path_buf(),
            limit: 10,
            tx_id: Some("mint-1".into()),
        })
        .unwrap();
        assert_eq!(by_tx.len(), 1);
    }
}
