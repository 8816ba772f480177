use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;

/// How a raw metric maps to a binary success outcome. Chosen once at the
/// end of calibration, never inside the generated code (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonteCarloMode {
    /// success = metric > threshold
    Threshold,
    /// success ~ Bernoulli(metric), metric already in [0, 1]
    Probability,
}

/// Aggregated result of the main Monte Carlo batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub n_runs: usize,
    pub probability: f64,
    pub ci_95: f64,
    /// `outcomes[i]` is the binary outcome for seed `i`, for the
    /// successful subset only.
    pub outcomes: Vec<bool>,
    pub calibration: Calibration,
    pub threshold_used: f64,
    pub mode: MonteCarloMode,
}

impl MonteCarloResult {
    /// Build the result from a vector of binary outcomes. `n_runs` is the
    /// count of outcomes actually used (the successful-execution subset,
    /// per spec §4.F's "n_runs is the successful count").
    pub fn from_outcomes(
        outcomes: Vec<bool>,
        calibration: Calibration,
        threshold_used: f64,
        mode: MonteCarloMode,
    ) -> Self {
        let n_runs = outcomes.len();
        let successes = outcomes.iter().filter(|o| **o).count();
        let probability = if n_runs == 0 {
            0.0
        } else {
            successes as f64 / n_runs as f64
        };
        let ci_95 = if n_runs == 0 {
            0.0
        } else {
            1.96 * (probability * (1.0 - probability) / n_runs as f64).sqrt()
        };

        Self {
            n_runs,
            probability,
            ci_95,
            outcomes,
            calibration,
            threshold_used,
            mode,
        }
    }
}
