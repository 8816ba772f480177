use serde::{Deserialize, Serialize};

/// Variance floor below which a calibration batch is considered degenerate.
/// See spec §3 invariants / §4.E.
pub const EPSILON_VARIANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationVerdict {
    Accepted,
    RejectedLowVariance,
    RejectedDegenerate,
}

impl CalibrationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CalibrationVerdict::Accepted)
    }
}

/// Summary statistics of the raw metrics collected during the calibration
/// batch, plus the chosen threshold and verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    pub threshold: f64,
    pub verdict: CalibrationVerdict,
}

impl Calibration {
    /// Compute min/max/mean/stdev from a non-empty, all-finite sample and
    /// pick a threshold (mean by default, or a caller-supplied override).
    ///
    /// Panics if `metrics` is empty — callers must enforce
    /// `CalibrationTooSmall` (K < 5) and the "single NaN escalates to
    /// repair" edge case before calling this.
    pub fn from_metrics(metrics: &[f64], user_threshold: Option<f64>) -> Self {
        assert!(!metrics.is_empty(), "calibration requires a non-empty sample");

        let min = metrics.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = metrics.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = metrics.iter().sum::<f64>() / metrics.len() as f64;
        let variance = metrics.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / metrics.len() as f64;
        let stdev = variance.sqrt();

        let threshold = user_threshold.unwrap_or(mean);

        let variance_floor = EPSILON_VARIANCE * mean.abs().max(1.0);
        let verdict = if max - min == 0.0 {
            CalibrationVerdict::RejectedDegenerate
        } else if stdev < variance_floor {
            CalibrationVerdict::RejectedLowVariance
        } else {
            CalibrationVerdict::Accepted
        };

        Self {
            min,
            max,
            mean,
            stdev,
            threshold,
            verdict,
        }
    }

    pub fn threshold_out_of_range(&self) -> bool {
        self.threshold < self.min || self.threshold > self.max
    }
}
