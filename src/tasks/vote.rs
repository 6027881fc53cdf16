//! Last-vote height of the monitored vote account, validator versus network.
//!
//! Issues `getVoteAccounts` filtered by the vote pubkey through the dual
//! requester with retry-on-slowness; each side reports the most recent slot
//! the account voted on, and the diff is computed when both are present.

use serde_json::json;
use tracing::{debug, error, warn};

use crate::error::TaskError;
use crate::metrics::registry::{VoteMetrics, set_gauge, set_labeled_gauge};
use crate::rpc::{DualOutcome, DualRpc, EndpointResult, RpcPayload, RpcRequest, request_with_retry};
use crate::tasks::validators::VoteAccountsResult;

const TASK: &str = "get_votes";

fn payload(vote_pub_key: &str) -> RpcPayload {
    RpcPayload::Single(RpcRequest::with_params(
        1,
        "getVoteAccounts",
        json!([{"votePubkey": vote_pub_key}]),
    ))
}

/// Most recent vote height from one side's reply: the first account in the
/// `current` list, falling back to `delinquent`.
fn last_vote(side: &EndpointResult) -> Option<f64> {
    let value = side.reply.as_ref()?.single_result()?;
    let accounts: VoteAccountsResult = match serde_json::from_value(value.clone()) {
        Ok(a) => a,
        Err(e) => {
            error!(task = TASK, "malformed getVoteAccounts result: {e}");
            return None;
        }
    };
    accounts
        .current
        .first()
        .or_else(|| accounts.delinquent.first())
        .and_then(|a| a.last_vote)
        .map(|v| v as f64)
}

/// Writes the vote-height gauges from one dual attempt.
pub fn update_vote_gauges(metrics: &VoteMetrics, outcome: &DualOutcome) {
    let net = last_vote(&outcome.network);
    let val = last_vote(&outcome.validator);

    if net.is_none() {
        warn!(task = TASK, "no vote data for network");
    }
    if val.is_none() {
        warn!(task = TASK, "no vote data for validator");
    }

    set_labeled_gauge(&metrics.network_vote_height, &["network"], net);
    set_labeled_gauge(&metrics.validator_vote_height, &["validator"], val);

    if let (Some(v), Some(n)) = (val, net) {
        set_gauge(&metrics.vote_height_diff, Some(v - n));
        debug!(task = TASK, "vote height diff: {}", v - n);
    }
}

/// Dual-endpoint vote heights with retry-on-slowness.
pub async fn vote_metrics<R: DualRpc>(
    rpc: &R,
    max_retries: u32,
    vote_pub_key: &str,
    metrics: &VoteMetrics,
) -> Result<(), TaskError> {
    let outcome = request_with_retry(rpc, &payload(vote_pub_key), TASK, max_retries).await;
    update_vote_gauges(metrics, &outcome);
    Ok(())
}
