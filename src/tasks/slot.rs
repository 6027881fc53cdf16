//! Slot and block-height positions of the validator versus the network.
//!
//! Both tasks issue their payload through the dual-endpoint requester with
//! the slow-call retry governor; diffs are computed only when both sides
//! produced data.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::metrics::registry::{SlotMetrics, set_gauge};
use crate::rpc::{DualOutcome, DualRpc, RpcPayload, RpcRequest, request_with_retry};

const SLOTS_TASK: &str = "get_slots";
const HEIGHT_TASK: &str = "get_block_height";

const MAX_RETRANSMIT_ID: u64 = 1;
const MAX_SHRED_INSERT_ID: u64 = 2;
const CURRENT_SLOT_ID: u64 = 3;

fn slots_payload() -> RpcPayload {
    RpcPayload::Batch(vec![
        RpcRequest::new(MAX_RETRANSMIT_ID, "getMaxRetransmitSlot"),
        RpcRequest::new(MAX_SHRED_INSERT_ID, "getMaxShredInsertSlot"),
        RpcRequest::with_params(
            CURRENT_SLOT_ID,
            "getSlot",
            json!([{"commitment": "confirmed"}]),
        ),
    ])
}

fn as_f64(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

/// Per-side slot readings extracted from one batch reply.
#[derive(Debug, Default, PartialEq)]
pub struct SlotReadings {
    pub current: Option<f64>,
    pub max_shred_insert: Option<f64>,
    pub max_retransmit: Option<f64>,
}

impl SlotReadings {
    fn from_outcome(side: &crate::rpc::EndpointResult) -> Option<Self> {
        let reply = side.reply.as_ref()?;
        Some(Self {
            current: as_f64(reply.result_by_id(CURRENT_SLOT_ID)),
            max_shred_insert: as_f64(reply.result_by_id(MAX_SHRED_INSERT_ID)),
            max_retransmit: as_f64(reply.result_by_id(MAX_RETRANSMIT_ID)),
        })
    }
}

/// Writes the slot gauges from one dual attempt. The diff is
/// `validator − network` and is skipped unless both current slots are
/// present.
pub fn update_slot_gauges(metrics: &SlotMetrics, outcome: &DualOutcome) {
    let network = SlotReadings::from_outcome(&outcome.network);
    let validator = SlotReadings::from_outcome(&outcome.validator);

    let net_slot = match &network {
        Some(r) => {
            set_gauge(&metrics.net_current_slot, r.current);
            set_gauge(&metrics.net_max_shred_insert_slot, r.max_shred_insert);
            set_gauge(&metrics.net_max_retransmit_slot, r.max_retransmit);
            debug!(task = SLOTS_TASK, "network readings: {r:?}");
            r.current
        }
        None => {
            warn!(task = SLOTS_TASK, "no slot data for network");
            None
        }
    };

    let val_slot = match &validator {
        Some(r) => {
            set_gauge(&metrics.current_slot, r.current);
            set_gauge(&metrics.val_max_shred_insert_slot, r.max_shred_insert);
            set_gauge(&metrics.val_max_retransmit_slot, r.max_retransmit);
            debug!(task = SLOTS_TASK, "validator readings: {r:?}");
            r.current
        }
        None => {
            warn!(task = SLOTS_TASK, "no slot data for validator");
            None
        }
    };

    if let (Some(v), Some(n)) = (val_slot, net_slot) {
        set_gauge(&metrics.slot_diff, Some(v - n));
        debug!(task = SLOTS_TASK, "slot diff: {}", v - n);
    }
}

/// Dual-endpoint slot positions with retry-on-slowness.
pub async fn slot_metrics<R: DualRpc>(
    rpc: &R,
    max_retries: u32,
    metrics: &SlotMetrics,
) -> Result<(), TaskError> {
    let outcome = request_with_retry(rpc, &slots_payload(), SLOTS_TASK, max_retries).await;
    update_slot_gauges(metrics, &outcome);
    Ok(())
}

/// Writes the block-height gauges from one dual attempt.
pub fn update_block_height_gauges(metrics: &SlotMetrics, outcome: &DualOutcome) {
    let net = outcome
        .network
        .reply
        .as_ref()
        .and_then(|r| as_f64(r.single_result()));
    let val = outcome
        .validator
        .reply
        .as_ref()
        .and_then(|r| as_f64(r.single_result()));

    if net.is_none() {
        warn!(task = HEIGHT_TASK, "no block height data for network");
    }
    if val.is_none() {
        warn!(task = HEIGHT_TASK, "no block height data for validator");
    }

    set_gauge(&metrics.network_block_height, net);
    set_gauge(&metrics.block_height, val);

    if let (Some(v), Some(n)) = (val, net) {
        set_gauge(&metrics.block_height_diff, Some(v - n));
        debug!(task = HEIGHT_TASK, "block height diff: {}", v - n);
    }
}

/// Dual-endpoint block heights with retry-on-slowness.
pub async fn block_height_metrics<R: DualRpc>(
    rpc: &R,
    max_retries: u32,
    metrics: &SlotMetrics,
) -> Result<(), TaskError> {
    let payload = RpcPayload::Single(RpcRequest::new(1, "getBlockHeight"));
    let outcome = request_with_retry(rpc, &payload, HEIGHT_TASK, max_retries).await;
    update_block_height_gauges(metrics, &outcome);
    Ok(())
}
