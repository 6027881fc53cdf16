//! Block production totals and skip rates from the `block-production` CLI
//! command.
//!
//! Network totals come from the top-level fields; the validator's own row is
//! matched by identity pubkey in the `leaders` list. When the validator has
//! no row this cycle, its gauges are zeroed and the skip-rate diff defaults
//! to the negative of the network rate rather than going stale.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cli::run_json_command;
use crate::error::TaskError;
use crate::metrics::registry::{BlockMetrics, set_gauge};
use crate::tasks::percentage;

const TASK: &str = "block_metrics";

/// `solana block-production --output json-compact` output. Top-level fields
/// are snake_case while leader rows are camelCase.
#[derive(Debug, Deserialize)]
pub struct BlockProduction {
    pub total_slots_skipped: Option<u64>,
    pub total_slots: Option<u64>,
    pub total_blocks_produced: Option<u64>,
    pub start_slot: Option<u64>,
    pub end_slot: Option<u64>,
    #[serde(default)]
    pub leaders: Vec<LeaderRow>,
}

/// One validator's row in the `leaders` list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderRow {
    pub identity_pubkey: Option<String>,
    pub leader_slots: Option<u64>,
    pub blocks_produced: Option<u64>,
    pub skipped_slots: Option<u64>,
}

/// Maps the parsed CLI output onto the block gauges.
pub fn update_block_production(metrics: &BlockMetrics, data: &BlockProduction, pub_key: &str) {
    set_gauge(&metrics.skipped_total, data.total_slots_skipped.map(|v| v as f64));
    set_gauge(&metrics.total_slots, data.total_slots.map(|v| v as f64));
    set_gauge(
        &metrics.total_blocks_produced,
        data.total_blocks_produced.map(|v| v as f64),
    );
    set_gauge(&metrics.confirmed_epoch_first_slot, data.start_slot.map(|v| v as f64));
    set_gauge(&metrics.confirmed_epoch_last_slot, data.end_slot.map(|v| v as f64));

    let net_skip_rate = match (data.total_slots_skipped, data.total_slots) {
        (Some(skipped), Some(total)) => {
            let rate = percentage(TASK, skipped as f64, total as f64);
            set_gauge(&metrics.net_skip_rate, Some(rate));
            Some(rate)
        }
        _ => {
            warn!(task = TASK, "network totals absent, skip rate not updated");
            None
        }
    };

    let row = data
        .leaders
        .iter()
        .find(|l| l.identity_pubkey.as_deref() == Some(pub_key));

    match row {
        Some(row) => {
            set_gauge(&metrics.val_skipped_slots, row.skipped_slots.map(|v| v as f64));
            set_gauge(&metrics.val_leader_slots, row.leader_slots.map(|v| v as f64));
            set_gauge(&metrics.val_blocks_produced, row.blocks_produced.map(|v| v as f64));

            if let (Some(skipped), Some(slots)) = (row.skipped_slots, row.leader_slots) {
                let val_rate = percentage(TASK, skipped as f64, slots as f64);
                set_gauge(&metrics.val_skip_rate, Some(val_rate));
                if let Some(net_rate) = net_skip_rate {
                    set_gauge(&metrics.skip_rate_diff, Some(val_rate - net_rate));
                    debug!(
                        task = TASK,
                        "validator skip rate {val_rate:.2}%, diff {:.2}",
                        val_rate - net_rate
                    );
                }
            }
        }
        None => {
            warn!(task = TASK, "no block production data found for validator");
            set_gauge(&metrics.val_skipped_slots, Some(0.0));
            set_gauge(&metrics.val_leader_slots, Some(0.0));
            set_gauge(&metrics.val_blocks_produced, Some(0.0));
            set_gauge(&metrics.val_skip_rate, Some(0.0));
            if let Some(net_rate) = net_skip_rate {
                set_gauge(&metrics.skip_rate_diff, Some(-net_rate));
            }
        }
    }
}

/// Blocking task: fetch block production via the CLI and update gauges.
///
/// Must run on the scheduler's worker pool; the CLI call blocks its thread.
pub fn block_production_metrics(
    binary: &str,
    pub_key: &str,
    metrics: &BlockMetrics,
) -> Result<(), TaskError> {
    let data: BlockProduction =
        run_json_command(binary, &["block-production", "--output", "json-compact"])?;
    update_block_production(metrics, &data, pub_key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;
    use serde_json::json;

    fn sample(leaders: serde_json::Value) -> BlockProduction {
        serde_json::from_value(json!({
            "total_slots_skipped": 500,
            "total_slots": 10000,
            "total_blocks_produced": 9500,
            "start_slot": 276480000u64,
            "end_slot": 276912000u64,
            "leaders": leaders,
        }))
        .expect("should parse")
    }

    #[test]
    fn validator_row_produces_rates_and_diff() {
        let metrics = MetricsRegistry::new().expect("registry");
        let data = sample(json!([
            {"identityPubkey": "other", "leaderSlots": 10, "blocksProduced": 10, "skippedSlots": 0},
            {"identityPubkey": "IdEnTiTy111", "leaderSlots": 200, "blocksProduced": 180, "skippedSlots": 20},
        ]));

        update_block_production(&metrics.block, &data, "IdEnTiTy111");

        let b = &metrics.block;
        assert_eq!(b.net_skip_rate.get(), 5.0);
        assert_eq!(b.val_skip_rate.get(), 10.0);
        assert_eq!(b.skip_rate_diff.get(), 5.0);
        assert_eq!(b.val_blocks_produced.get(), 180.0);
        assert_eq!(b.val_leader_slots.get(), 200.0);
        assert_eq!(b.total_slots.get(), 10000.0);
        assert_eq!(b.confirmed_epoch_first_slot.get(), 276480000.0);
    }

    #[test]
    fn absent_validator_zeroes_gauges_and_negates_network_rate() {
        let metrics = MetricsRegistry::new().expect("registry");
        let data = sample(json!([
            {"identityPubkey": "other", "leaderSlots": 10, "blocksProduced": 10, "skippedSlots": 0},
        ]));

        update_block_production(&metrics.block, &data, "IdEnTiTy111");

        let b = &metrics.block;
        assert_eq!(b.val_skip_rate.get(), 0.0);
        assert_eq!(b.val_skipped_slots.get(), 0.0);
        assert_eq!(b.val_blocks_produced.get(), 0.0);
        assert_eq!(b.skip_rate_diff.get(), -5.0);
    }

    #[test]
    fn zero_leader_slots_defaults_rate_to_zero() {
        let metrics = MetricsRegistry::new().expect("registry");
        let data = sample(json!([
            {"identityPubkey": "IdEnTiTy111", "leaderSlots": 0, "blocksProduced": 0, "skippedSlots": 0},
        ]));

        update_block_production(&metrics.block, &data, "IdEnTiTy111");
        assert_eq!(metrics.block.val_skip_rate.get(), 0.0);
        assert_eq!(metrics.block.skip_rate_diff.get(), -5.0);
    }
}
