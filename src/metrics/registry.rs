//! Prometheus gauge registry.
//!
//! One [`MetricsRegistry`] is constructed at process start and handed to
//! every derivation function by reference; there are no module-level metric
//! singletons. Gauges are grouped per metric family, each registered into
//! the shared `prometheus::Registry` through a `register` constructor.
//!
//! All writes go through [`set_gauge`] / [`set_labeled_gauge`], which treat
//! a `None` value as "leave the gauge untouched" so a failed fetch never
//! overwrites the last good value with a sentinel.

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::error;

/// Registers a plain gauge into `registry`.
fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

/// Registers a labeled gauge into `registry`.
fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let g = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

/// Sets `metric` to `value` when present; `None` is a no-op so the gauge
/// keeps its previously written value.
pub fn set_gauge(metric: &Gauge, value: Option<f64>) {
    if let Some(v) = value {
        metric.set(v);
    }
}

/// Labeled counterpart of [`set_gauge`]. `labels` must match the label
/// dimensions the gauge was registered with.
pub fn set_labeled_gauge(metric: &GaugeVec, labels: &[&str], value: Option<f64>) {
    if let Some(v) = value {
        metric.with_label_values(labels).set(v);
    }
}

/// Identity and vote account balances, in SOL.
#[derive(Clone)]
pub struct BalanceMetrics {
    pub account_balance: Gauge,
    pub vote_account_balance: Gauge,
}

impl BalanceMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            account_balance: gauge(r, "solana_account_balance", "Identity account balance")?,
            vote_account_balance: gauge(r, "solana_vote_account_balance", "Vote account balance")?,
        })
    }
}

/// Block production totals and skip rates from the `block-production` CLI.
#[derive(Clone)]
pub struct BlockMetrics {
    pub net_skip_rate: Gauge,
    pub skipped_total: Gauge,
    pub val_blocks_produced: Gauge,
    pub val_skip_rate: Gauge,
    pub val_skipped_slots: Gauge,
    pub total_blocks_produced: Gauge,
    pub skip_rate_diff: Gauge,
    pub val_leader_slots: Gauge,
    pub total_slots: Gauge,
    pub confirmed_epoch_first_slot: Gauge,
    pub confirmed_epoch_last_slot: Gauge,
}

impl BlockMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            net_skip_rate: gauge(r, "solana_net_skip_rate", "Network skip rate")?,
            skipped_total: gauge(
                r,
                "solana_skipped_total",
                "Total skipped slots of network in current epoch",
            )?,
            val_blocks_produced: gauge(
                r,
                "solana_val_blocks_produced",
                "Blocks produced of a validator in current epoch",
            )?,
            val_skip_rate: gauge(r, "solana_val_skip_rate", "Validator skip rate")?,
            val_skipped_slots: gauge(
                r,
                "solana_val_skipped_slots",
                "Skipped slots of a validator in current epoch",
            )?,
            total_blocks_produced: gauge(
                r,
                "solana_total_blocks_produced",
                "Total blocks produced in current epoch",
            )?,
            skip_rate_diff: gauge(
                r,
                "solana_skip_rate_diff",
                "Skip rate difference of network and validator",
            )?,
            val_leader_slots: gauge(
                r,
                "solana_val_leader_slots",
                "Leader slots of a validator in current epoch",
            )?,
            total_slots: gauge(r, "solana_total_slots", "Total slots in current epoch")?,
            confirmed_epoch_first_slot: gauge(
                r,
                "solana_confirmed_epoch_first_slot",
                "First slot in current epoch",
            )?,
            confirmed_epoch_last_slot: gauge(
                r,
                "solana_confirmed_epoch_last_slot",
                "Last slot in current epoch",
            )?,
        })
    }
}

/// Network epoch progress from `getEpochInfo`.
#[derive(Clone)]
pub struct EpochMetrics {
    pub network_epoch: Gauge,
    pub tx_count: Gauge,
    pub slot_in_epoch: Gauge,
    pub slot_index: Gauge,
}

impl EpochMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            network_epoch: gauge(
                r,
                "solana_network_epoch",
                "Current epoch of network (max confirmation)",
            )?,
            tx_count: gauge(r, "solana_tx_count", "solana transaction count")?,
            slot_in_epoch: gauge(r, "solana_slot_in_epoch", "solana_slot_in_epoch")?,
            slot_index: gauge(r, "solana_slot_index", "solana_slot_index")?,
        })
    }
}

/// Leader-slot schedule and timing for the monitored validator.
#[derive(Clone)]
pub struct LeaderMetrics {
    pub val_total_leader_slots: Gauge,
    pub next_leader_slot: Gauge,
    pub time_to_next_slot: Gauge,
    pub avg_slot_duration: Gauge,
    pub next_slot_time: Gauge,
    pub previous_leader_slot: Gauge,
}

impl LeaderMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            val_total_leader_slots: gauge(
                r,
                "solana_val_total_leader_slots",
                "Total number of leader slots in current epoch",
            )?,
            next_leader_slot: gauge(r, "solana_next_leader_slot", "The next leader slot")?,
            time_to_next_slot: gauge(
                r,
                "solana_time_to_next_slot",
                "Time until the next leader slot in seconds",
            )?,
            avg_slot_duration: gauge(
                r,
                "solana_avg_slot_duration",
                "Average slot duration in seconds",
            )?,
            next_slot_time: gauge(r, "solana_next_slot_time", "Time of the next leader slot")?,
            previous_leader_slot: gauge(
                r,
                "solana_previous_leader_slot",
                "The previous leader slot",
            )?,
        })
    }
}

/// Node health as reported by the validator's own `getHealth`.
#[derive(Clone)]
pub struct HealthMetrics {
    pub node_health: GaugeVec,
    pub node_slots_behind: Gauge,
}

impl HealthMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            node_health: gauge_vec(
                r,
                "solana_node_health",
                "Health status of the Solana node",
                &["status", "cause"],
            )?,
            node_slots_behind: gauge(
                r,
                "solana_node_slots_behind",
                "Number of slots the Solana node is behind",
            )?,
        })
    }
}

/// Slot and block-height positions per endpoint plus their diffs.
#[derive(Clone)]
pub struct SlotMetrics {
    pub block_height: Gauge,
    pub network_block_height: Gauge,
    pub block_height_diff: Gauge,
    pub current_slot: Gauge,
    pub net_current_slot: Gauge,
    pub slot_diff: Gauge,
    pub net_max_shred_insert_slot: Gauge,
    pub net_max_retransmit_slot: Gauge,
    pub val_max_shred_insert_slot: Gauge,
    pub val_max_retransmit_slot: Gauge,
}

impl SlotMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            block_height: gauge(
                r,
                "solana_block_height",
                "Current Block Height of validator",
            )?,
            network_block_height: gauge(
                r,
                "solana_network_block_height",
                "Current Block Height of network",
            )?,
            block_height_diff: gauge(
                r,
                "solana_block_height_diff",
                "Current Block Height difference of network and validator",
            )?,
            current_slot: gauge(r, "solana_current_slot", "Current validator slot height")?,
            net_current_slot: gauge(
                r,
                "solana_net_current_slot",
                "Current network slot height",
            )?,
            slot_diff: gauge(
                r,
                "solana_slot_diff",
                "Current slot difference of network and validator",
            )?,
            net_max_shred_insert_slot: gauge(
                r,
                "solana_net_max_shred_insert_slot",
                "Get the max NETWORK slot seen from after shred insert",
            )?,
            net_max_retransmit_slot: gauge(
                r,
                "solana_net_max_retransmit_slot",
                "Get the max NETWORK slot seen from retransmit stage",
            )?,
            val_max_shred_insert_slot: gauge(
                r,
                "solana_val_max_shred_insert_slot",
                "Get the max VALIDATOR slot seen from after shred insert",
            )?,
            val_max_retransmit_slot: gauge(
                r,
                "solana_val_max_retransmit_slot",
                "Get the max VALIDATOR slot seen from retransmit stage",
            )?,
        })
    }
}

/// Stake totals and the monitored validator's vote-account status.
#[derive(Clone)]
pub struct ValidatorMetrics {
    pub active_stake: Gauge,
    pub current_stake: Gauge,
    pub delinquent_stake: Gauge,
    pub val_commission: GaugeVec,
    pub active_validators: GaugeVec,
    pub validator_activated_stake: GaugeVec,
    pub val_status: GaugeVec,
    pub vote_credits: Gauge,
    pub avg_vote_credits: Gauge,
    pub total_credits: Gauge,
}

impl ValidatorMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            active_stake: gauge(r, "solana_active_stake", "Active Stake SOLs")?,
            current_stake: gauge(r, "solana_current_stake", "Current Stake SOLs")?,
            delinquent_stake: gauge(r, "solana_delinquent_stake", "Delinquent Stake SOLs")?,
            val_commission: gauge_vec(
                r,
                "solana_val_commission",
                "Solana validator current commission",
                &["commission"],
            )?,
            active_validators: gauge_vec(
                r,
                "solana_active_validators",
                "Total number of active validators by state",
                &["state"],
            )?,
            validator_activated_stake: gauge_vec(
                r,
                "solana_validator_activated_stake",
                "Activated stake per validator",
                &["pubkey", "votekey"],
            )?,
            val_status: gauge_vec(
                r,
                "solana_val_status",
                "Solana validator voting status i.e., voting or jailed",
                &["state"],
            )?,
            vote_credits: gauge(
                r,
                "solana_vote_credits",
                "Solana validator vote credits of current epoch",
            )?,
            avg_vote_credits: gauge(
                r,
                "solana_avg_vote_credits",
                "Average network vote credits of current epoch",
            )?,
            total_credits: gauge(
                r,
                "solana_total_credits",
                "Solana validator vote credits of all epochs",
            )?,
        })
    }
}

/// Node version reported by the validator endpoint.
#[derive(Clone)]
pub struct VersionMetrics {
    pub node_version: GaugeVec,
}

impl VersionMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            node_version: gauge_vec(
                r,
                "solana_node_version",
                "Node version of solana",
                &["version"],
            )?,
        })
    }
}

/// Last-vote heights per endpoint and their diff.
#[derive(Clone)]
pub struct VoteMetrics {
    pub validator_vote_height: GaugeVec,
    pub network_vote_height: GaugeVec,
    pub vote_height_diff: Gauge,
}

impl VoteMetrics {
    pub fn register(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            validator_vote_height: gauge_vec(
                r,
                "solana_validator_vote_height",
                "Most recent VALIDATOR slot voted on by this vote account",
                &["rpc"],
            )?,
            network_vote_height: gauge_vec(
                r,
                "solana_network_vote_height",
                "Most recent NETWORK slot voted on by this vote account",
                &["rpc"],
            )?,
            vote_height_diff: gauge(
                r,
                "solana_vote_height_diff",
                "Vote height difference of validator and network",
            )?,
        })
    }
}

/// Wrapper around the Prometheus registry and every gauge family the
/// exporter publishes.
///
/// Constructed once in `main`, wrapped in an `Arc`, and shared between the
/// collection tasks and the HTTP exporter.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub balance: BalanceMetrics,
    pub block: BlockMetrics,
    pub epoch: EpochMetrics,
    pub leader: LeaderMetrics,
    pub health: HealthMetrics,
    pub slot: SlotMetrics,
    pub validator: ValidatorMetrics,
    pub version: VersionMetrics,
    pub vote: VoteMetrics,
}

impl MetricsRegistry {
    /// Creates a fresh registry with every gauge family registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        Ok(Self {
            balance: BalanceMetrics::register(&registry)?,
            block: BlockMetrics::register(&registry)?,
            epoch: EpochMetrics::register(&registry)?,
            leader: LeaderMetrics::register(&registry)?,
            health: HealthMetrics::register(&registry)?,
            slot: SlotMetrics::register(&registry)?,
            validator: ValidatorMetrics::register(&registry)?,
            version: VersionMetrics::register(&registry)?,
            vote: VoteMetrics::register(&registry)?,
            registry,
        })
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
