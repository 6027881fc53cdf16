// src/main.rs
//
// Exporter binary:
//
// - loads config.yml (path overridable as the first CLI argument),
// - starts the Prometheus /metrics exporter (bind failure is fatal),
// - runs the collect/sleep loop until SIGINT/SIGTERM,
// - gives in-flight tasks a short grace period on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use solana_exporter::{Collector, Config, MetricsRegistry, bind_metrics_listener, serve_metrics};

/// How long in-flight tasks get to unwind after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());
    let cfg = Config::load(&config_path).map_err(|e| format!("failed to load {config_path}: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.log_level.clone()))
        .init();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    let addr = cfg.metrics_listen_addr();
    // The only fatal startup error: the export port must be bindable.
    let listener = bind_metrics_listener(addr)
        .await
        .map_err(|e| format!("failed to bind metrics port {addr}: {e}"))?;
    tokio::spawn(serve_metrics(listener, metrics.clone()));
    info!("metrics exporter listening on http://{addr}/metrics");

    // ---------------------------
    // Collection loop
    // ---------------------------

    let collector = Collector::new(cfg, metrics);

    tokio::select! {
        _ = collector.run() => {}
        _ = shutdown_signal() => {
            info!(
                "draining in-flight tasks for {}s before exit",
                SHUTDOWN_GRACE.as_secs()
            );
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        }
    }

    info!("shutting down Prometheus exporter");
    Ok(())
}

/// Completes on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};
        let mut sigterm = match unix_signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                let _ = signal::ctrl_c().await;
                info!("shutdown signal received");
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}
