//! Solana validator metrics exporter library.
//!
//! This crate polls a validator's local RPC endpoint, a public network RPC
//! endpoint and the `solana` CLI every cycle, and republishes the
//! validator-vs-network comparison as Prometheus gauges:
//!
//! - JSON-RPC plumbing with dual-endpoint fan-out and slow-call retry
//!   (`rpc`),
//! - a blocking adapter for CLI-sourced data (`cli`),
//! - per-family metric derivation tasks (`tasks`),
//! - the gauge registry and `/metrics` HTTP exporter (`metrics`),
//! - the cycle scheduler (`collector`),
//! - and file-based configuration (`config`).
//!
//! The binary in `main.rs` wires these together; everything is also usable
//! from integration tests against stub RPC servers.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rpc;
pub mod tasks;

// Re-export the types a typical embedding touches.
pub use collector::Collector;
pub use config::{Config, ConfigError};
pub use error::TaskError;
pub use metrics::{MetricsRegistry, bind_metrics_listener, serve_metrics};
pub use rpc::{DualClient, DualOutcome, DualRpc, RpcClient, RpcPayload, RpcRequest};
