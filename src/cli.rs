//! Adapter for metrics sourced from the `solana` CLI.
//!
//! The CLI is invoked synchronously and blocks its thread for the full run,
//! so callers must only ever run this inside the scheduler's bounded worker
//! pool (`spawn_blocking`), never on the async task group.
//!
//! The CLI occasionally prefixes its JSON output with explanatory lines
//! ("Note: ..."); those are stripped before parsing.

use std::process::Command;

use serde::de::DeserializeOwned;

use crate::error::TaskError;

/// Marker identifying benign annotation lines in CLI output.
const NOISE_MARKER: &str = "Note:";

/// Drops annotation lines from raw CLI stdout, leaving only the JSON body.
pub fn strip_noise_lines(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| !line.contains(NOISE_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs `binary` with `args`, strips noise lines from stdout and parses the
/// remainder as JSON into `T`.
///
/// Blocking. Non-zero exit, spawn failure and JSON decode failure all come
/// back as a [`TaskError`]; the caller decides what to log and skips this
/// task's gauges for the cycle.
pub fn run_json_command<T: DeserializeOwned>(binary: &str, args: &[&str]) -> Result<T, TaskError> {
    let output = Command::new(binary)
        .args(args)
        .output()
        .map_err(|e| TaskError::Subprocess(format!("failed to run {binary}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TaskError::Subprocess(format!(
            "{binary} {} exited with {}: {}",
            args.join(" "),
            output.status,
            stderr.trim(),
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let cleaned = strip_noise_lines(&stdout);

    serde_json::from_str(&cleaned)
        .map_err(|e| TaskError::Decode(format!("invalid JSON from {binary}: {e}")))
}
