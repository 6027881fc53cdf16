//! Collection cycle scheduler.
//!
//! Every cycle runs two task groups concurrently:
//!
//! - blocking CLI tasks, dispatched through `spawn_blocking` behind a
//!   semaphore sized to the configured worker pool, and
//! - non-blocking RPC tasks, spawned together onto the runtime.
//!
//! Each task runs inside its own spawned handle so a failure — or a panic —
//! in one never prevents the others from running or from running on the
//! next cycle; outcomes are logged with the task name and dropped. The
//! cycle has no timeout of its own: a slow task only delays the cycle's
//! end, and gauges not yet rewritten simply keep their previous values.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::error::TaskError;
use crate::metrics::MetricsRegistry;
use crate::rpc::{DualClient, RpcClient};
use crate::tasks;
use crate::tasks::version::VersionTracker;

/// Orchestrates one collection cycle and the sleep/collect loop.
///
/// Cheap to clone; the registry, worker pool and version tracker are shared
/// behind `Arc`s so each spawned task can carry its own handle.
#[derive(Clone)]
pub struct Collector {
    config: Arc<Config>,
    metrics: Arc<MetricsRegistry>,
    client: RpcClient,
    dual: DualClient,
    versions: Arc<VersionTracker>,
    workers: Arc<Semaphore>,
}

impl Collector {
    pub fn new(config: Config, metrics: Arc<MetricsRegistry>) -> Self {
        let client = RpcClient::new();
        let dual = DualClient::new(
            client.clone(),
            config.network_rpc_endpoint.clone(),
            config.validator_rpc_endpoint.clone(),
        );
        let workers = Arc::new(Semaphore::new(config.thread_pool_size.max(1)));
        Self {
            config: Arc::new(config),
            metrics,
            client,
            dual,
            versions: Arc::new(VersionTracker::new()),
            workers,
        }
    }

    /// Runs one blocking task on the worker pool, waiting for a free slot
    /// first. A panic inside the task surfaces as a `TaskError` here.
    async fn run_blocking<F>(&self, task: F) -> Result<(), TaskError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let _permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TaskError::Subprocess("worker pool closed".to_string()))?;
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|e| TaskError::Subprocess(format!("worker panicked: {e}")))?
    }

    /// Runs one collection cycle: all tasks spawned, all awaited, every
    /// failure logged against its task name, nothing propagated.
    pub async fn collect(&self) {
        let mut handles: Vec<(&'static str, JoinHandle<Result<(), TaskError>>)> = Vec::new();

        // Blocking CLI group, bounded by the worker pool.
        {
            let c = self.clone();
            handles.push((
                "block_metrics",
                tokio::spawn(async move {
                    let binary = c.config.solana_binary_path.clone();
                    let pub_key = c.config.pub_key.clone();
                    let metrics = c.metrics.clone();
                    c.run_blocking(move || {
                        tasks::block::block_production_metrics(&binary, &pub_key, &metrics.block)
                    })
                    .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "validator_metrics",
                tokio::spawn(async move {
                    let binary = c.config.solana_binary_path.clone();
                    let metrics = c.metrics.clone();
                    c.run_blocking(move || {
                        tasks::validators::validator_stake_metrics(&binary, &metrics.validator)
                    })
                    .await
                }),
            ));
        }

        // Non-blocking RPC group, started together; completion order is
        // unconstrained since each derivation only uses its own result.
        {
            let c = self.clone();
            handles.push((
                "get_block_height",
                tokio::spawn(async move {
                    tasks::slot::block_height_metrics(&c.dual, c.config.retry, &c.metrics.slot)
                        .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "get_slots",
                tokio::spawn(async move {
                    tasks::slot::slot_metrics(&c.dual, c.config.retry, &c.metrics.slot).await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "get_votes",
                tokio::spawn(async move {
                    tasks::vote::vote_metrics(
                        &c.dual,
                        c.config.retry,
                        &c.config.vote_pub_key,
                        &c.metrics.vote,
                    )
                    .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "balance_metrics",
                tokio::spawn(async move {
                    tasks::balance::balance_metrics(
                        &c.client,
                        &c.config.network_rpc_endpoint,
                        &c.config.pub_key,
                        &c.config.vote_pub_key,
                        &c.metrics.balance,
                    )
                    .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "get_vote_accounts",
                tokio::spawn(async move {
                    tasks::validators::vote_account_metrics(
                        &c.client,
                        &c.config.network_rpc_endpoint,
                        &c.config.pub_key,
                        &c.config.vote_pub_key,
                        &c.metrics.validator,
                    )
                    .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "leader_slot_metrics",
                tokio::spawn(async move {
                    tasks::leader::leader_slot_metrics(
                        &c.client,
                        &c.config.network_rpc_endpoint,
                        &c.config.pub_key,
                        &c.metrics.leader,
                    )
                    .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "get_epoch_information",
                tokio::spawn(async move {
                    tasks::epoch::epoch_metrics(
                        &c.client,
                        &c.config.network_rpc_endpoint,
                        &c.metrics.epoch,
                    )
                    .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "get_health",
                tokio::spawn(async move {
                    tasks::health::health_metrics(
                        &c.client,
                        &c.config.validator_rpc_endpoint,
                        &c.metrics.health,
                    )
                    .await
                }),
            ));
        }
        {
            let c = self.clone();
            handles.push((
                "get_version",
                tokio::spawn(async move {
                    tasks::version::version_metrics(
                        &c.client,
                        &c.config.validator_rpc_endpoint,
                        &c.versions,
                        c.config.version_filter.as_deref(),
                        &c.metrics.version,
                    )
                    .await
                }),
            ));
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(task = name, "error collecting metric: {e}"),
                Err(e) => error!(task = name, "task panicked: {e}"),
            }
        }
    }

    /// Collect-sleep loop. Runs until the future is dropped (shutdown is
    /// driven by `select!` in the caller).
    pub async fn run(&self) {
        loop {
            let start = Instant::now();
            info!("starting collection of metrics");
            self.collect().await;
            info!(
                "metrics collected successfully in {:.2} seconds",
                start.elapsed().as_secs_f64()
            );

            info!("sleeping for {} seconds", self.config.sleep_time);
            tokio::time::sleep(Duration::from_secs(self.config.sleep_time)).await;
        }
    }
}
