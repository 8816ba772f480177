use serde::{Deserialize, Serialize};

/// One invocation of `run_trial(seed)`: a raw metric and the derived binary
/// outcome. Seeds within a single MonteCarloResult are unique.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub seed: u64,
    pub metric: f64,
    pub success: bool,
}

impl TrialOutcome {
    pub fn new(seed: u64, metric: f64, success: bool) -> Self {
        Self {
            seed,
            metric,
            success,
        }
    }

    /// A trial is usable only if its metric is finite; NaN/∞ is always a
    /// repairable execution failure, never a valid outcome.
    pub fn is_finite(&self) -> bool {
        self.metric.is_finite()
    }
}
