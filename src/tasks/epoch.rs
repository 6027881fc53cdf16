//! Network epoch progress from `getEpochInfo`.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::metrics::registry::{EpochMetrics, set_gauge};
use crate::rpc::{RpcClient, RpcPayload, RpcRequest};

const TASK: &str = "get_epoch_information";

/// `getEpochInfo` result shape; every field optional so a missing one skips
/// its gauge instead of failing the decode.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochInfo {
    pub epoch: Option<u64>,
    pub slot_index: Option<u64>,
    pub slots_in_epoch: Option<u64>,
    pub transaction_count: Option<u64>,
}

/// Writes the epoch gauges from a decoded `getEpochInfo` result.
pub fn update_epoch_info(metrics: &EpochMetrics, info: &EpochInfo) {
    set_gauge(&metrics.network_epoch, info.epoch.map(|v| v as f64));
    set_gauge(&metrics.slot_in_epoch, info.slots_in_epoch.map(|v| v as f64));
    set_gauge(&metrics.slot_index, info.slot_index.map(|v| v as f64));
    set_gauge(&metrics.tx_count, info.transaction_count.map(|v| v as f64));

    for (field, present) in [
        ("epoch", info.epoch.is_some()),
        ("slotsInEpoch", info.slots_in_epoch.is_some()),
        ("slotIndex", info.slot_index.is_some()),
        ("transactionCount", info.transaction_count.is_some()),
    ] {
        if !present {
            warn!(task = TASK, field, "field absent, gauge not updated");
        }
    }
}

/// Fetches epoch information from the network endpoint and updates gauges.
pub async fn epoch_metrics(
    client: &RpcClient,
    network_url: &str,
    metrics: &EpochMetrics,
) -> Result<(), TaskError> {
    let payload = RpcPayload::Single(RpcRequest::new(1, "getEpochInfo"));
    let result = client.call(network_url, &payload, TASK).await;

    let value: &Value = result
        .reply
        .as_ref()
        .and_then(|r| r.single_result())
        .ok_or(TaskError::Missing("getEpochInfo result"))?;

    let info: EpochInfo = serde_json::from_value(value.clone())
        .map_err(|e| TaskError::Decode(format!("getEpochInfo: {e}")))?;

    debug!(
        task = TASK,
        "epoch: {:?}, slot in epoch: {:?}, slot index: {:?}, transaction count: {:?}",
        info.epoch, info.slots_in_epoch, info.slot_index, info.transaction_count
    );
    update_epoch_info(metrics, &info);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;
    use serde_json::json;

    #[test]
    fn all_fields_update_their_gauges() {
        let metrics = MetricsRegistry::new().expect("registry");
        let info: EpochInfo = serde_json::from_value(json!({
            "epoch": 640,
            "slotIndex": 1234,
            "slotsInEpoch": 432000,
            "transactionCount": 99_000_000u64,
        }))
        .expect("should parse");

        update_epoch_info(&metrics.epoch, &info);
        assert_eq!(metrics.epoch.network_epoch.get(), 640.0);
        assert_eq!(metrics.epoch.slot_index.get(), 1234.0);
        assert_eq!(metrics.epoch.slot_in_epoch.get(), 432000.0);
        assert_eq!(metrics.epoch.tx_count.get(), 99_000_000.0);
    }

    #[test]
    fn absent_field_skips_only_its_gauge() {
        let metrics = MetricsRegistry::new().expect("registry");
        metrics.epoch.tx_count.set(42.0);

        let info: EpochInfo =
            serde_json::from_value(json!({"epoch": 641, "slotIndex": 5, "slotsInEpoch": 432000}))
                .expect("should parse");
        update_epoch_info(&metrics.epoch, &info);

        assert_eq!(metrics.epoch.network_epoch.get(), 641.0);
        // transactionCount missing: previous value retained.
        assert_eq!(metrics.epoch.tx_count.get(), 42.0);
    }
}
