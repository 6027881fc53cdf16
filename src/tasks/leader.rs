//! Leader-slot schedule and timing for the monitored validator.
//!
//! Gathers four network-endpoint readings concurrently (current slot,
//! identity-filtered leader schedule, epoch geometry, recent performance
//! sample), then derives the next/previous leader slot and the estimated
//! wall-clock time of the next one. The leader schedule reports slot offsets
//! relative to the first slot of the epoch; everything is converted to
//! absolute slots before comparison.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::error::TaskError;
use crate::metrics::registry::{LeaderMetrics, set_gauge};
use crate::rpc::{RpcClient, RpcPayload, RpcRequest};

const TASK: &str = "leader_slot_metrics";

/// `getEpochSchedule` result shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochSchedule {
    pub first_normal_epoch: Option<u64>,
    pub first_normal_slot: Option<u64>,
    pub slots_per_epoch: Option<u64>,
}

/// One entry of `getRecentPerformanceSamples`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceSample {
    num_slots: u64,
    sample_period_secs: f64,
}

/// Everything the derivation needs, fully resolved.
#[derive(Debug)]
pub struct LeaderInputs {
    pub current_slot: u64,
    /// Leader slots of this validator, as offsets within the current epoch.
    pub leader_slots_in_epoch: Vec<u64>,
    pub first_normal_epoch: u64,
    pub first_normal_slot: u64,
    pub slots_per_epoch: u64,
    pub epoch: u64,
    pub slot_duration_secs: f64,
}

/// Derived leader-slot readings.
#[derive(Debug, PartialEq)]
pub struct LeaderDerived {
    pub next_leader_slot: Option<u64>,
    pub time_to_next_slot_secs: Option<f64>,
    /// Estimated wall-clock time of the next leader slot, unix seconds
    /// rounded down to the minute.
    pub next_slot_time_unix: Option<f64>,
    pub previous_leader_slot: u64,
    pub total_leader_slots: usize,
}

/// Pure derivation from resolved inputs; `now_unix_secs` is injected so
/// tests are deterministic.
pub fn derive_leader_slots(inputs: &LeaderInputs, now_unix_secs: f64) -> LeaderDerived {
    let first_slot_in_epoch = inputs
        .epoch
        .saturating_sub(inputs.first_normal_epoch)
        .saturating_mul(inputs.slots_per_epoch)
        .saturating_add(inputs.first_normal_slot);

    let next = inputs
        .leader_slots_in_epoch
        .iter()
        .copied()
        .find(|s| s + first_slot_in_epoch > inputs.current_slot);
    let previous = inputs
        .leader_slots_in_epoch
        .iter()
        .rev()
        .copied()
        .find(|s| s + first_slot_in_epoch < inputs.current_slot)
        .unwrap_or(0);

    let (next_abs, time_to_next, next_time) = match next {
        Some(offset) => {
            let abs = first_slot_in_epoch + offset;
            let secs = (abs - inputs.current_slot) as f64 * inputs.slot_duration_secs;
            let at = ((now_unix_secs + secs) / 60.0).floor() * 60.0;
            (Some(abs), Some(secs), Some(at))
        }
        None => (None, None, None),
    };

    LeaderDerived {
        next_leader_slot: next_abs,
        time_to_next_slot_secs: time_to_next,
        next_slot_time_unix: next_time,
        previous_leader_slot: first_slot_in_epoch + previous,
        total_leader_slots: inputs.leader_slots_in_epoch.len(),
    }
}

/// Writes the leader gauges. A missing upcoming slot zeroes the next-slot
/// gauges (the validator may simply have no remaining slots this epoch).
pub fn update_leader_gauges(metrics: &LeaderMetrics, inputs: &LeaderInputs, derived: &LeaderDerived) {
    match derived.next_leader_slot {
        Some(abs) => {
            set_gauge(&metrics.next_leader_slot, Some(abs as f64));
            set_gauge(&metrics.time_to_next_slot, derived.time_to_next_slot_secs);
            set_gauge(&metrics.next_slot_time, derived.next_slot_time_unix);
            debug!(
                task = TASK,
                "next leader slot {abs} in {:.2}s",
                derived.time_to_next_slot_secs.unwrap_or_default()
            );
        }
        None => {
            warn!(task = TASK, "no upcoming leader slots found");
            metrics.next_leader_slot.set(0.0);
            metrics.time_to_next_slot.set(0.0);
            metrics.next_slot_time.set(0.0);
        }
    }

    set_gauge(
        &metrics.previous_leader_slot,
        Some(derived.previous_leader_slot as f64),
    );
    set_gauge(
        &metrics.val_total_leader_slots,
        Some(derived.total_leader_slots as f64),
    );
    set_gauge(&metrics.avg_slot_duration, Some(inputs.slot_duration_secs));
}

async fn fetch_result(
    client: &RpcClient,
    url: &str,
    method: &'static str,
    params: Option<Value>,
) -> Option<Value> {
    let request = match params {
        Some(p) => RpcRequest::with_params(1, method, p),
        None => RpcRequest::new(1, method),
    };
    let result = client.call(url, &RpcPayload::Single(request), TASK).await;
    result
        .reply
        .as_ref()
        .and_then(|r| r.single_result())
        .cloned()
}

/// Average slot duration from the newest performance sample; a zero slot
/// count is defaulted to 0 instead of dividing by zero.
fn slot_duration_from(samples: Option<Value>) -> Option<f64> {
    let samples: Vec<PerformanceSample> =
        serde_json::from_value(samples?).ok()?;
    let sample = samples.first()?;
    if sample.num_slots == 0 {
        warn!(task = TASK, "performance sample has zero slots, defaulting duration to 0");
        Some(0.0)
    } else {
        Some(sample.sample_period_secs / sample.num_slots as f64)
    }
}

/// Fetches all leader-slot inputs and updates the leader gauges.
pub async fn leader_slot_metrics(
    client: &RpcClient,
    network_url: &str,
    pub_key: &str,
    metrics: &LeaderMetrics,
) -> Result<(), TaskError> {
    let (current_slot, schedule, epoch_schedule, epoch_info, samples) = tokio::join!(
        fetch_result(
            client,
            network_url,
            "getSlot",
            Some(json!([{"commitment": "confirmed"}])),
        ),
        fetch_result(
            client,
            network_url,
            "getLeaderSchedule",
            Some(json!([null, {"identity": pub_key}])),
        ),
        fetch_result(client, network_url, "getEpochSchedule", None),
        fetch_result(client, network_url, "getEpochInfo", None),
        fetch_result(client, network_url, "getRecentPerformanceSamples", Some(json!([1]))),
    );

    let current_slot = current_slot.and_then(|v| v.as_u64());
    let leader_slots: Option<Vec<u64>> = schedule.map(|v| {
        // An identity missing from the schedule is an empty slot list, not
        // a failure.
        v.get(pub_key)
            .and_then(|s| serde_json::from_value(s.clone()).ok())
            .unwrap_or_default()
    });
    let epoch_schedule: Option<EpochSchedule> =
        epoch_schedule.and_then(|v| serde_json::from_value(v).ok());
    let epoch = epoch_info.and_then(|v| v.get("epoch").and_then(Value::as_u64));
    let slot_duration = slot_duration_from(samples);

    let (
        Some(current_slot),
        Some(leader_slots_in_epoch),
        Some(schedule),
        Some(epoch),
        Some(slot_duration_secs),
    ) = (current_slot, leader_slots, epoch_schedule, epoch, slot_duration)
    else {
        error!(task = TASK, "failed to fetch all required data, skipping metric collection");
        return Err(TaskError::Missing("leader slot inputs"));
    };

    let (Some(first_normal_epoch), Some(first_normal_slot), Some(slots_per_epoch)) = (
        schedule.first_normal_epoch,
        schedule.first_normal_slot,
        schedule.slots_per_epoch,
    ) else {
        error!(task = TASK, "incomplete epoch schedule, skipping metric collection");
        return Err(TaskError::Missing("epoch schedule fields"));
    };

    let inputs = LeaderInputs {
        current_slot,
        leader_slots_in_epoch,
        first_normal_epoch,
        first_normal_slot,
        slots_per_epoch,
        epoch,
        slot_duration_secs,
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    let derived = derive_leader_slots(&inputs, now);
    update_leader_gauges(metrics, &inputs, &derived);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;

    fn inputs() -> LeaderInputs {
        LeaderInputs {
            current_slot: 10_050,
            leader_slots_in_epoch: vec![10, 40, 70],
            first_normal_epoch: 0,
            first_normal_slot: 0,
            slots_per_epoch: 10_000,
            epoch: 1,
            slot_duration_secs: 0.5,
        }
    }

    #[test]
    fn next_and_previous_slots_are_absolute() {
        // First slot of epoch 1 is 10_000; offsets 10 and 40 are in the
        // past, 70 is upcoming.
        let derived = derive_leader_slots(&inputs(), 1_700_000_000.0);
        assert_eq!(derived.next_leader_slot, Some(10_070));
        assert_eq!(derived.previous_leader_slot, 10_040);
        assert_eq!(derived.total_leader_slots, 3);
        // 20 slots ahead at 0.5s per slot.
        assert_eq!(derived.time_to_next_slot_secs, Some(10.0));
        // Rounded down to the minute.
        let at = derived.next_slot_time_unix.expect("next slot time");
        assert_eq!(at % 60.0, 0.0);
        assert!(at <= 1_700_000_010.0);
    }

    #[test]
    fn no_upcoming_slot_zeroes_next_gauges() {
        let metrics = MetricsRegistry::new().expect("registry");
        metrics.leader.next_leader_slot.set(123.0);

        let mut i = inputs();
        i.current_slot = 10_071; // past every assigned slot
        let derived = derive_leader_slots(&i, 1_700_000_000.0);
        assert_eq!(derived.next_leader_slot, None);
        assert_eq!(derived.previous_leader_slot, 10_070);

        update_leader_gauges(&metrics.leader, &i, &derived);
        assert_eq!(metrics.leader.next_leader_slot.get(), 0.0);
        assert_eq!(metrics.leader.time_to_next_slot.get(), 0.0);
        assert_eq!(metrics.leader.previous_leader_slot.get(), 10_070.0);
        assert_eq!(metrics.leader.val_total_leader_slots.get(), 3.0);
        assert_eq!(metrics.leader.avg_slot_duration.get(), 0.5);
    }

    #[test]
    fn empty_schedule_reports_zero_total_and_first_slot_as_previous() {
        let mut i = inputs();
        i.leader_slots_in_epoch.clear();
        let derived = derive_leader_slots(&i, 1_700_000_000.0);
        assert_eq!(derived.next_leader_slot, None);
        assert_eq!(derived.previous_leader_slot, 10_000);
        assert_eq!(derived.total_leader_slots, 0);
    }

    #[test]
    fn zero_slot_sample_defaults_duration_to_zero() {
        let duration = slot_duration_from(Some(serde_json::json!([
            {"numSlots": 0, "samplePeriodSecs": 60.0}
        ])));
        assert_eq!(duration, Some(0.0));

        let duration = slot_duration_from(Some(serde_json::json!([
            {"numSlots": 120, "samplePeriodSecs": 60.0}
        ])));
        assert_eq!(duration, Some(0.5));

        assert_eq!(slot_duration_from(Some(serde_json::json!([]))), None);
        assert_eq!(slot_duration_from(None), None);
    }
}
