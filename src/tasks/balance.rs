//! Identity and vote account balances.
//!
//! One batched `getBalance` call against the network endpoint covers both
//! accounts; responses are matched back by id, not position.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::metrics::registry::{BalanceMetrics, set_gauge};
use crate::rpc::{RpcClient, RpcPayload, RpcReply, RpcRequest};
use crate::tasks::lamports_to_sol;

const TASK: &str = "balance_metrics";

const IDENTITY_REQ_ID: u64 = 1;
const VOTE_REQ_ID: u64 = 2;

/// `getBalance` result shape.
#[derive(Debug, Deserialize)]
struct BalanceValue {
    value: u64,
}

fn balance_by_id(reply: &RpcReply, id: u64) -> Option<f64> {
    let value = reply.result_by_id(id)?;
    match serde_json::from_value::<BalanceValue>(value.clone()) {
        Ok(b) => Some(lamports_to_sol(b.value)),
        Err(e) => {
            warn!(task = TASK, id, "malformed getBalance result: {e}");
            None
        }
    }
}

/// Applies fetched balances to the gauges; either side may be absent.
pub fn update_balances(metrics: &BalanceMetrics, identity: Option<f64>, vote: Option<f64>) {
    set_gauge(&metrics.account_balance, identity);
    set_gauge(&metrics.vote_account_balance, vote);
}

/// Fetches both account balances and updates the balance gauges.
pub async fn balance_metrics(
    client: &RpcClient,
    network_url: &str,
    pub_key: &str,
    vote_pub_key: &str,
    metrics: &BalanceMetrics,
) -> Result<(), TaskError> {
    let payload = RpcPayload::Batch(vec![
        RpcRequest::with_params(IDENTITY_REQ_ID, "getBalance", json!([pub_key])),
        RpcRequest::with_params(VOTE_REQ_ID, "getBalance", json!([vote_pub_key])),
    ]);

    let result = client.call(network_url, &payload, TASK).await;
    let reply = result
        .reply
        .as_ref()
        .ok_or(TaskError::Missing("getBalance response"))?;

    let identity = balance_by_id(reply, IDENTITY_REQ_ID);
    let vote = balance_by_id(reply, VOTE_REQ_ID);
    debug!(
        task = TASK,
        "identity balance: {identity:?} SOL, vote account balance: {vote:?} SOL"
    );

    update_balances(metrics, identity, vote);
    Ok(())
}
