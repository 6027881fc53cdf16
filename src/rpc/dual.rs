//! Dual-endpoint requester.
//!
//! The comparative metrics all hinge on issuing the same payload against the
//! validator's own RPC endpoint and a public network endpoint and diffing
//! the two answers. [`DualClient`] does exactly that: one payload in, both
//! sides' results and latencies out, with every failure mode degraded to a
//! missing slot rather than an error.

use tracing::{debug, warn};

use super::client::{EndpointResult, RpcClient, RpcPayload};

/// Outcome of one dual-endpoint attempt. Both slots are always present;
/// a failed side is an [`EndpointResult`] with empty fields.
#[derive(Clone, Debug, Default)]
pub struct DualOutcome {
    pub network: EndpointResult,
    pub validator: EndpointResult,
}

impl DualOutcome {
    /// True when any observed latency exceeds `threshold_secs`.
    ///
    /// A side with no latency (failed call) does not count as slow; slowness
    /// is a property of calls that actually completed.
    pub fn any_slower_than(&self, threshold_secs: f64) -> bool {
        [&self.network, &self.validator]
            .iter()
            .any(|r| r.latency_secs.is_some_and(|t| t > threshold_secs))
    }
}

/// Seam over the dual request so the retry governor can be exercised with a
/// scripted fake in tests.
pub trait DualRpc {
    fn request(
        &self,
        payload: &RpcPayload,
        task: &str,
    ) -> impl Future<Output = DualOutcome> + Send;
}

/// Issues one payload concurrently against the validator and network
/// endpoints through a shared [`RpcClient`].
#[derive(Clone, Debug)]
pub struct DualClient {
    client: RpcClient,
    network_url: String,
    validator_url: String,
}

impl DualClient {
    pub fn new(
        client: RpcClient,
        network_url: impl Into<String>,
        validator_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            network_url: network_url.into(),
            validator_url: validator_url.into(),
        }
    }
}

impl DualRpc for DualClient {
    async fn request(&self, payload: &RpcPayload, task: &str) -> DualOutcome {
        let (network, validator) = tokio::join!(
            self.client.call(&self.network_url, payload, task),
            self.client.call(&self.validator_url, payload, task),
        );

        for (side, result) in [("network", &network), ("validator", &validator)] {
            match result.latency_secs {
                Some(t) => debug!(task, side, "response time {t:.4}s"),
                None => warn!(task, side, "no valid response time"),
            }
        }

        DualOutcome { network, validator }
    }
}
