//! Slow-call retry governor for dual-endpoint requests.
//!
//! There is no hard per-call timeout anywhere in the exporter; transient RPC
//! slowness (a node under load) usually self-heals within a few attempts, so
//! the governor simply re-issues the whole dual request while any observed
//! latency exceeds the threshold, up to a bounded retry budget. After the
//! budget is spent the **last** attempt is used as-is, slow or partially
//! failed or not — there is no fallback to an earlier attempt.

use tracing::info;

use super::client::RpcPayload;
use super::dual::{DualOutcome, DualRpc};

/// Latency above which a completed call is considered slow, in seconds.
pub const SLOW_CALL_THRESHOLD_SECS: f64 = 1.0;

/// Issues `payload` through `rpc`, retrying while any side of the latest
/// attempt was slower than [`SLOW_CALL_THRESHOLD_SECS`], at most
/// `max_retries` extra attempts. Never fails; the caller always receives the
/// outcome of the final attempt.
pub async fn request_with_retry<R: DualRpc>(
    rpc: &R,
    payload: &RpcPayload,
    task: &str,
    max_retries: u32,
) -> DualOutcome {
    let mut outcome = rpc.request(payload, task).await;

    let mut retries = 0;
    while retries < max_retries && outcome.any_slower_than(SLOW_CALL_THRESHOLD_SECS) {
        retries += 1;
        info!(
            task,
            retries, max_retries, "request took longer than {SLOW_CALL_THRESHOLD_SECS}s, retrying"
        );
        outcome = rpc.request(payload, task).await;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::rpc::client::{EndpointResult, RpcRequest};

    /// Scripted fake: returns pre-programmed outcomes in order and counts
    /// how many requests were issued. The last outcome repeats if the script
    /// runs out.
    struct ScriptedRpc {
        script: Mutex<Vec<DualOutcome>>,
        calls: Mutex<u32>,
    }

    impl ScriptedRpc {
        fn new(script: Vec<DualOutcome>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl DualRpc for ScriptedRpc {
        async fn request(&self, _payload: &RpcPayload, _task: &str) -> DualOutcome {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn attempt(latency: f64, marker: u64) -> DualOutcome {
        // `marker` is smuggled through the reply id so tests can tell which
        // attempt's data survived.
        let reply = serde_json::from_value(
            serde_json::json!({"jsonrpc": "2.0", "id": marker, "result": marker}),
        )
        .expect("reply should parse");
        DualOutcome {
            network: EndpointResult {
                reply: Some(reply),
                latency_secs: Some(latency),
            },
            validator: EndpointResult {
                reply: None,
                latency_secs: Some(0.1),
            },
        }
    }

    fn marker_of(outcome: &DualOutcome) -> u64 {
        match outcome.network.reply.as_ref().expect("reply present") {
            crate::rpc::client::RpcReply::Single(r) => r.id.expect("id present"),
            _ => panic!("expected single reply"),
        }
    }

    fn payload() -> RpcPayload {
        RpcPayload::Single(RpcRequest::new(1, "getSlot"))
    }

    #[tokio::test]
    async fn fast_first_attempt_is_not_retried() {
        let rpc = ScriptedRpc::new(vec![attempt(0.2, 1)]);
        let outcome = request_with_retry(&rpc, &payload(), "test", 5).await;
        assert_eq!(rpc.calls(), 1);
        assert_eq!(marker_of(&outcome), 1);
    }

    #[tokio::test]
    async fn slow_attempts_retry_until_a_fast_one() {
        // Attempts 1..=3 slow, attempt 4 fast; budget of 5 allows it.
        let rpc = ScriptedRpc::new(vec![
            attempt(1.4, 1),
            attempt(1.3, 2),
            attempt(1.2, 3),
            attempt(0.3, 4),
        ]);
        let outcome = request_with_retry(&rpc, &payload(), "test", 5).await;
        assert_eq!(rpc.calls(), 4);
        assert_eq!(marker_of(&outcome), 4);
    }

    #[tokio::test]
    async fn exhausted_budget_keeps_the_last_slow_attempt() {
        // Every attempt is slow: exactly max_retries retries happen and the
        // final attempt's data is kept even though it is still slow.
        let rpc = ScriptedRpc::new(vec![
            attempt(2.0, 1),
            attempt(2.0, 2),
            attempt(2.0, 3),
            attempt(2.0, 4),
        ]);
        let outcome = request_with_retry(&rpc, &payload(), "test", 3).await;
        assert_eq!(rpc.calls(), 4); // initial attempt + 3 retries
        assert_eq!(marker_of(&outcome), 4);
        assert!(outcome.any_slower_than(SLOW_CALL_THRESHOLD_SECS));
    }

    #[tokio::test]
    async fn failed_sides_do_not_trigger_retries() {
        let rpc = ScriptedRpc::new(vec![DualOutcome::default()]);
        let outcome = request_with_retry(&rpc, &payload(), "test", 5).await;
        assert_eq!(rpc.calls(), 1);
        assert!(outcome.network.reply.is_none());
        assert!(outcome.validator.reply.is_none());
    }
}
