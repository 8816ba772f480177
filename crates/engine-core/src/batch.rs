use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    ProviderUnavailable,
    GenerationInvalid,
    ExecutionFailure,
    CalibrationRejection,
    TaskFailure,
}

/// Structured record of a market that did not produce a PipelineResult.
/// The scheduler never throws these — they're recorded per slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub slug: String,
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum BatchOutcome {
    Success(PipelineResult),
    Failure(FailureRecord),
}

/// One batch entry, keyed by market slug, in original selection order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub slug: String,
    pub outcome: BatchOutcome,
}

/// Per-market outcomes across a whole batch run, preserving selection
/// order (spec §4.G "Ordering").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn push_success(&mut self, slug: impl Into<String>, result: PipelineResult) {
        self.entries.push(BatchEntry {
            slug: slug.into(),
            outcome: BatchOutcome::Success(result),
        });
    }

    pub fn push_failure(&mut self, record: FailureRecord) {
        self.entries.push(BatchEntry {
            slug: record.slug.clone(),
            outcome: BatchOutcome::Failure(record),
        });
    }

    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, BatchOutcome::Failure(_)))
            .count()
    }

    pub fn has_any_failure(&self) -> bool {
        self.failure_count() > 0
    }
}
