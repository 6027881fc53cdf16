//! Prometheus metrics: the gauge registry and the `/metrics` HTTP exporter.

pub mod registry;
pub mod server;

pub use registry::{
    BalanceMetrics, BlockMetrics, EpochMetrics, HealthMetrics, LeaderMetrics, MetricsRegistry,
    SlotMetrics, ValidatorMetrics, VersionMetrics, VoteMetrics, set_gauge, set_labeled_gauge,
};
pub use server::{bind_metrics_listener, serve_metrics};
