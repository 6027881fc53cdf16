//! Stake totals from the `validators` CLI command and the monitored
//! validator's vote-account status from `getVoteAccounts`.
//!
//! The vote-account task batches `getVoteAccounts` with `getEpochInfo` so
//! vote credits can be matched to the current epoch instead of blindly
//! taking the newest entry, and it also derives the network-wide average
//! vote credits across all current validators.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::cli::run_json_command;
use crate::error::TaskError;
use crate::metrics::registry::{ValidatorMetrics, set_gauge, set_labeled_gauge};
use crate::rpc::{RpcClient, RpcPayload, RpcRequest};
use crate::tasks::lamports_to_sol;

const STAKE_TASK: &str = "validator_metrics";
const VOTE_ACCOUNTS_TASK: &str = "get_vote_accounts";

const VOTE_ACCOUNTS_REQ_ID: u64 = 1;
const EPOCH_INFO_REQ_ID: u64 = 2;

/// Top-level totals of the `solana validators --output json-compact` output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorsSummary {
    pub total_active_stake: Option<u64>,
    pub total_current_stake: Option<u64>,
    pub total_delinquent_stake: Option<u64>,
}

/// `getVoteAccounts` result: current and delinquent account lists.
#[derive(Debug, Default, Deserialize)]
pub struct VoteAccountsResult {
    #[serde(default)]
    pub current: Vec<VoteAccount>,
    #[serde(default)]
    pub delinquent: Vec<VoteAccount>,
}

/// One vote account entry. `epoch_credits` rows are
/// `[epoch, credits, previous_credits]`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAccount {
    pub vote_pubkey: Option<String>,
    pub node_pubkey: Option<String>,
    pub activated_stake: Option<u64>,
    pub commission: Option<u64>,
    pub epoch_vote_account: Option<bool>,
    #[serde(default)]
    pub epoch_credits: Vec<(u64, u64, u64)>,
    pub last_vote: Option<u64>,
}

impl VoteAccount {
    /// Epoch-credit row for `epoch`, falling back to the newest row when the
    /// current epoch has no entry yet.
    pub fn credits_for_epoch(&self, epoch: Option<u64>) -> Option<(u64, u64, u64)> {
        epoch
            .and_then(|e| self.epoch_credits.iter().find(|(ep, _, _)| *ep == e))
            .or_else(|| self.epoch_credits.last())
            .copied()
    }

    /// Credits earned in the matched epoch: `credits − previous_credits`.
    pub fn epoch_vote_credits(&self, epoch: Option<u64>) -> Option<u64> {
        self.credits_for_epoch(epoch)
            .map(|(_, credits, prev)| credits.saturating_sub(prev))
    }
}

/// Writes the stake-total gauges from the CLI summary.
pub fn update_stake_totals(metrics: &ValidatorMetrics, summary: &ValidatorsSummary) {
    set_gauge(
        &metrics.active_stake,
        summary.total_active_stake.map(lamports_to_sol),
    );
    set_gauge(
        &metrics.current_stake,
        summary.total_current_stake.map(lamports_to_sol),
    );
    set_gauge(
        &metrics.delinquent_stake,
        summary.total_delinquent_stake.map(lamports_to_sol),
    );
}

/// Blocking task: `solana validators` stake totals.
///
/// Must run on the scheduler's worker pool; the CLI call blocks its thread.
pub fn validator_stake_metrics(
    binary: &str,
    metrics: &ValidatorMetrics,
) -> Result<(), TaskError> {
    let summary: ValidatorsSummary =
        run_json_command(binary, &["validators", "--output", "json-compact"])?;
    debug!(
        task = STAKE_TASK,
        "active: {:?}, current: {:?}, delinquent: {:?} (lamports)",
        summary.total_active_stake, summary.total_current_stake, summary.total_delinquent_stake
    );
    update_stake_totals(metrics, &summary);
    Ok(())
}

/// Derives every vote-account gauge from the fetched lists.
///
/// Returns an error when the monitored validator appears in neither the
/// current nor the delinquent list; its status and stake gauges are left
/// untouched for this cycle.
pub fn update_vote_accounts(
    metrics: &ValidatorMetrics,
    accounts: &VoteAccountsResult,
    current_epoch: Option<u64>,
    pub_key: &str,
    vote_pub_key: &str,
) -> Result<(), TaskError> {
    set_labeled_gauge(
        &metrics.active_validators,
        &["current"],
        Some(accounts.current.len() as f64),
    );
    set_labeled_gauge(
        &metrics.active_validators,
        &["delinquent"],
        Some(accounts.delinquent.len() as f64),
    );

    // Network-wide average vote credits over all current validators.
    let credits: Vec<u64> = accounts
        .current
        .iter()
        .filter_map(|a| a.epoch_vote_credits(current_epoch))
        .collect();
    if !credits.is_empty() {
        let avg = credits.iter().sum::<u64>() as f64 / credits.len() as f64;
        set_gauge(&metrics.avg_vote_credits, Some(avg));
    }

    let ours = accounts
        .current
        .iter()
        .find(|a| a.node_pubkey.as_deref() == Some(pub_key))
        .or_else(|| {
            let found = accounts
                .delinquent
                .iter()
                .find(|a| a.node_pubkey.as_deref() == Some(pub_key));
            if found.is_some() {
                error!(task = VOTE_ACCOUNTS_TASK, "validator is in DELINQUENT state");
            }
            found
        });

    let Some(account) = ours else {
        return Err(TaskError::Missing(
            "validator not found in current or delinquent vote account lists",
        ));
    };

    set_labeled_gauge(
        &metrics.validator_activated_stake,
        &[pub_key, vote_pub_key],
        account.activated_stake.map(lamports_to_sol),
    );
    if let Some(commission) = account.commission {
        let label = commission.to_string();
        set_labeled_gauge(
            &metrics.val_commission,
            &[label.as_str()],
            Some(commission as f64),
        );
    }

    match account.epoch_vote_account {
        Some(true) => set_labeled_gauge(&metrics.val_status, &["voting"], Some(1.0)),
        Some(false) | None => set_labeled_gauge(&metrics.val_status, &["not voting"], Some(0.0)),
    }

    if let Some((_, credits, prev)) = account.credits_for_epoch(current_epoch) {
        set_gauge(&metrics.vote_credits, Some(credits.saturating_sub(prev) as f64));
        set_gauge(&metrics.total_credits, Some(credits as f64));
    }

    info!(task = VOTE_ACCOUNTS_TASK, "updated vote account gauges");
    Ok(())
}

/// Fetches vote accounts plus the current epoch and updates the validator
/// gauges.
pub async fn vote_account_metrics(
    client: &RpcClient,
    network_url: &str,
    pub_key: &str,
    vote_pub_key: &str,
    metrics: &ValidatorMetrics,
) -> Result<(), TaskError> {
    let payload = RpcPayload::Batch(vec![
        RpcRequest::with_params(
            VOTE_ACCOUNTS_REQ_ID,
            "getVoteAccounts",
            json!([{"commitment": "recent"}]),
        ),
        RpcRequest::new(EPOCH_INFO_REQ_ID, "getEpochInfo"),
    ]);

    let result = client.call(network_url, &payload, VOTE_ACCOUNTS_TASK).await;
    let reply = result
        .reply
        .as_ref()
        .ok_or(TaskError::Missing("getVoteAccounts response"))?;

    let accounts: VoteAccountsResult = reply
        .result_by_id(VOTE_ACCOUNTS_REQ_ID)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| TaskError::Decode(format!("getVoteAccounts: {e}")))?
        .ok_or(TaskError::Missing("getVoteAccounts result"))?;

    let current_epoch = reply
        .result_by_id(EPOCH_INFO_REQ_ID)
        .and_then(|v| v.get("epoch"))
        .and_then(|v| v.as_u64());

    update_vote_accounts(metrics, &accounts, current_epoch, pub_key, vote_pub_key)
}
