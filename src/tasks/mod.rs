//! Metric derivation tasks, one module per metric family.
//!
//! Each module pairs a fetch step (RPC or CLI) with a derivation step that
//! maps the typed payload onto gauges. Derivations only perform presence
//! checks, unit normalization and diff/ratio computation; a missing field
//! skips its gauge update and logs, it never fails the cycle.

pub mod balance;
pub mod block;
pub mod epoch;
pub mod health;
pub mod leader;
pub mod slot;
pub mod validators;
pub mod version;
pub mod vote;

use tracing::warn;

/// Lamports per SOL; RPC and CLI stake/balance figures are integer lamports.
pub const LAMPORTS_PER_SOL: f64 = 1e9;

/// Converts an integer lamport amount to SOL.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}

/// `(numerator / denominator) * 100`, with a zero denominator special-cased
/// to 0 (logged as a warning) instead of producing a NaN/inf gauge value.
pub fn percentage(task: &str, numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        warn!(task, "division by zero in ratio computation, defaulting to 0");
        0.0
    } else {
        (numerator / denominator) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lamports_normalize_to_sol() {
        assert_eq!(lamports_to_sol(2_500_000_000), 2.5);
        assert_eq!(lamports_to_sol(0), 0.0);
    }

    #[test]
    fn percentage_guards_zero_denominator() {
        assert_eq!(percentage("test", 5.0, 0.0), 0.0);
        assert_eq!(percentage("test", 5.0, 200.0), 2.5);
        assert_eq!(percentage("test", 0.0, 200.0), 0.0);
    }
}
