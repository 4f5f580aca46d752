//! Per-run metrics handed to the reporting side.

use serde::{Deserialize, Serialize};

/// Final metrics of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Fraction of normal tasks whose aggregated label equals the true label
    pub accuracy: f64,

    /// Golden-pool tasks some attacker has seen more than K times
    pub exposed_golden: usize,

    /// Golden assignments per distinct requesting worker
    pub testing_cost: f64,

    /// Wall-clock (or virtual) duration of the run in milliseconds
    pub elapsed_ms: f64,

    /// Total golden assignments
    pub golden_assignments: usize,

    /// Workers banned during the run
    pub banned_workers: usize,

    /// Normal tasks promoted into the golden pool
    pub promoted_tasks: usize,

    /// Truth-inference passes, final pass included
    pub inference_passes: usize,
}
