//! Node version reported by the validator endpoint.
//!
//! The version gauge is labeled by version string, so after an upgrade the
//! previous version's series would keep its stale value of 1. A small
//! in-process [`VersionTracker`] remembers every version reported so far and
//! zeroes the ones that no longer match, instead of re-reading our own
//! exported text to discover them. An optional substring filter narrows
//! which remembered versions participate in the zeroing.

use std::collections::HashSet;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::info;

use crate::error::TaskError;
use crate::metrics::registry::{VersionMetrics, set_labeled_gauge};
use crate::rpc::{RpcClient, RpcPayload, RpcRequest};

const TASK: &str = "get_version";

/// `getVersion` result shape.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "solana-core")]
    solana_core: Option<String>,
}

/// Remembers which version label values have been reported so far.
#[derive(Debug, Default)]
pub struct VersionTracker {
    seen: Mutex<HashSet<String>>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `current` and returns the previously-seen versions that
    /// differ from it and pass `filter` (a substring match), i.e. the label
    /// values whose gauge should be zeroed.
    pub fn stale_versions(&self, current: &str, filter: Option<&str>) -> Vec<String> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let stale = seen
            .iter()
            .filter(|v| v.as_str() != current)
            .filter(|v| filter.is_none_or(|f| v.contains(f)))
            .cloned()
            .collect();
        seen.insert(current.to_string());
        stale
    }
}

/// Marks `current` as the running version and zeroes stale version series.
pub fn update_version(
    metrics: &VersionMetrics,
    tracker: &VersionTracker,
    current: &str,
    filter: Option<&str>,
) {
    for stale in tracker.stale_versions(current, filter) {
        set_labeled_gauge(&metrics.node_version, &[stale.as_str()], Some(0.0));
    }
    set_labeled_gauge(&metrics.node_version, &[current], Some(1.0));
}

/// Fetches the validator's node version and updates the version gauge.
pub async fn version_metrics(
    client: &RpcClient,
    validator_url: &str,
    tracker: &VersionTracker,
    filter: Option<&str>,
    metrics: &VersionMetrics,
) -> Result<(), TaskError> {
    let payload = RpcPayload::Single(RpcRequest::new(1, "getVersion"));
    let result = client.call(validator_url, &payload, TASK).await;

    let value = result
        .reply
        .as_ref()
        .and_then(|r| r.single_result())
        .ok_or(TaskError::Missing("getVersion result"))?;

    let info: VersionInfo = serde_json::from_value(value.clone())
        .map_err(|e| TaskError::Decode(format!("getVersion: {e}")))?;
    let current = info
        .solana_core
        .ok_or(TaskError::Missing("solana-core version field"))?;

    info!(task = TASK, "node version of solana: {current}");
    update_version(metrics, tracker, &current, filter);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;

    #[test]
    fn upgrade_zeroes_previous_version_series() {
        let metrics = MetricsRegistry::new().expect("registry");
        let tracker = VersionTracker::new();

        update_version(&metrics.version, &tracker, "1.14.17", None);
        assert_eq!(
            metrics.version.node_version.with_label_values(&["1.14.17"]).get(),
            1.0
        );

        update_version(&metrics.version, &tracker, "1.14.18", None);
        assert_eq!(
            metrics.version.node_version.with_label_values(&["1.14.17"]).get(),
            0.0
        );
        assert_eq!(
            metrics.version.node_version.with_label_values(&["1.14.18"]).get(),
            1.0
        );
    }

    #[test]
    fn filter_limits_which_stale_versions_are_zeroed() {
        let tracker = VersionTracker::new();
        assert!(tracker.stale_versions("1.0.5", Some("1.0")).is_empty());
        assert!(tracker.stale_versions("2.2.4", Some("1.0")).is_empty());

        // "1.0.5" matches the filter, "2.2.4" does not.
        let stale = tracker.stale_versions("3.0.0", Some("1.0"));
        assert_eq!(stale, vec!["1.0.5".to_string()]);
    }

    #[test]
    fn unchanged_version_produces_no_stale_entries() {
        let tracker = VersionTracker::new();
        assert!(tracker.stale_versions("1.14.17", None).is_empty());
        assert!(tracker.stale_versions("1.14.17", None).is_empty());
    }
}
