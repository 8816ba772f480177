use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classification of a single execution attempt's diagnostics, driving the
/// Execution & Repair Loop's next action (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticClassification {
    Success,
    CompileOrParseError,
    RuntimeError,
    Timeout,
    NonFiniteMetric,
    StructuralViolation,
    InsufficientStochasticity,
}

impl DiagnosticClassification {
    /// Whether this classification should route back into the generator
    /// for a repair attempt rather than exiting the loop.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, DiagnosticClassification::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPhase {
    SmokeTest,
    Repair,
    Calibration,
    MonteCarlo,
    FallbackUsed,
}

/// One entry in the ordered execution log, appended on every attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub attempt_index: u32,
    pub phase: ExecutionPhase,
    pub duration_ms: u64,
    pub classification: DiagnosticClassification,
    pub detail: String,
}

impl ExecutionLogEntry {
    pub fn new(
        attempt_index: u32,
        phase: ExecutionPhase,
        duration: Duration,
        classification: DiagnosticClassification,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            attempt_index,
            phase,
            duration_ms: duration.as_millis() as u64,
            classification,
            detail: detail.into(),
        }
    }
}
