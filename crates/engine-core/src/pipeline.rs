use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactDescription, SimulationArtifact};
use crate::execution_log::ExecutionLogEntry;
use crate::market::MarketDescriptor;
use crate::montecarlo::MonteCarloResult;
use crate::research::ResearchBundle;
use crate::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Succeeded,
    SucceededWithFallback,
    PartiallyFailed,
    Cancelled,
    Failed,
}

/// Explanation surfaced to the end user, derived from the artifact's
/// self-description block when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub description: Option<ArtifactDescription>,
}

/// Full artifact of one market's pipeline run. `monte_carlo`/`signal` are
/// `None` when the status is `PartiallyFailed` or `Failed` — the pipeline
/// always produces an `Explanation` summary, even for a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub market: MarketDescriptor,
    pub research: ResearchBundle,
    pub artifact: SimulationArtifact,
    pub monte_carlo: Option<MonteCarloResult>,
    pub signal: Option<Signal>,
    pub explanation: Explanation,
    pub status: PipelineStatus,
    pub execution_log: Vec<ExecutionLogEntry>,
}
