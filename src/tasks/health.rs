//! Node health from the validator's own `getHealth`.
//!
//! A healthy node answers `"ok"`; an unhealthy one answers with an error
//! object that may carry `numSlotsBehind`. A transport failure is reported
//! as healthy=0 so the scrape still reflects that the node could not be
//! reached.

use serde::Deserialize;
use tracing::{error, info};

use crate::error::TaskError;
use crate::metrics::registry::{HealthMetrics, set_gauge, set_labeled_gauge};
use crate::rpc::{RpcClient, RpcPayload, RpcReply, RpcRequest};

const TASK: &str = "get_health";

/// `data` field of the `getHealth` error object.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthErrorData {
    num_slots_behind: Option<u64>,
}

/// Interprets a `getHealth` reply (or its absence) and writes the health
/// gauges.
pub fn update_health(metrics: &HealthMetrics, reply: Option<&RpcReply>) {
    let Some(reply) = reply else {
        set_labeled_gauge(&metrics.node_health, &["healthy", "none"], Some(0.0));
        return;
    };

    if reply.single_result().and_then(|v| v.as_str()) == Some("ok") {
        set_labeled_gauge(&metrics.node_health, &["healthy", "none"], Some(1.0));
        info!(task = TASK, "node is healthy");
        return;
    }

    if let Some(err) = reply.single_error() {
        let data: HealthErrorData = err
            .data
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        set_labeled_gauge(&metrics.node_health, &["unhealthy", "slots_behind"], Some(1.0));
        set_labeled_gauge(&metrics.node_health, &["healthy", "none"], Some(0.0));
        set_gauge(
            &metrics.node_slots_behind,
            data.num_slots_behind.map(|v| v as f64),
        );
        error!(task = TASK, "node is unhealthy: {}", err.message);
        return;
    }

    error!(task = TASK, "unexpected getHealth response format");
    set_labeled_gauge(&metrics.node_health, &["healthy", "none"], Some(0.0));
}

/// Polls the validator endpoint's health and updates the health gauges.
pub async fn health_metrics(
    client: &RpcClient,
    validator_url: &str,
    metrics: &HealthMetrics,
) -> Result<(), TaskError> {
    let payload = RpcPayload::Single(RpcRequest::new(1, "getHealth"));
    let result = client.call(validator_url, &payload, TASK).await;
    update_health(metrics, result.reply.as_ref());
    Ok(())
}
