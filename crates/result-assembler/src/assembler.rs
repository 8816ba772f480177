use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use engine_core::{
    slugify_question, ArtifactDescription, BatchOutcome, BatchReport, EngineResult, ExecutionLogEntry,
    PipelineResult,
};

/// `PipelineResult` with the artifact's code text dropped — it already
/// lives verbatim in `model.py` next to this file, duplicating it into
/// JSON would only bloat `result.json`.
#[derive(Serialize)]
struct ResultSummary<'a> {
    market: &'a engine_core::MarketDescriptor,
    artifact_is_fallback: bool,
    artifact_description: &'a Option<ArtifactDescription>,
    monte_carlo: &'a Option<engine_core::MonteCarloResult>,
    signal: &'a Option<engine_core::Signal>,
    explanation: &'a engine_core::Explanation,
    status: engine_core::PipelineStatus,
}

impl<'a> From<&'a PipelineResult> for ResultSummary<'a> {
    fn from(result: &'a PipelineResult) -> Self {
        Self {
            market: &result.market,
            artifact_is_fallback: result.artifact.is_fallback,
            artifact_description: &result.artifact.description,
            monte_carlo: &result.monte_carlo,
            signal: &result.signal,
            explanation: &result.explanation,
            status: result.status,
        }
    }
}

/// Writes a whole batch's results to `{root}/{label}_{timestamp}/`:
/// `summary.json` (the full `BatchReport`) plus one subdirectory per
/// market named via `slugify_question`, containing `model.py`,
/// `result.json`, `research.txt`, and `execution.log` (spec §4.H).
/// Returns the batch directory's path.
pub fn write_batch(
    root: &Path,
    label: &str,
    timestamp: DateTime<Utc>,
    report: &BatchReport,
) -> EngineResult<PathBuf> {
    let batch_dir = root.join(format!("{label}_{}", timestamp.format("%Y%m%dT%H%M%SZ")));
    std::fs::create_dir_all(&batch_dir)?;

    let summary_json = serde_json::to_string_pretty(report)?;
    std::fs::write(batch_dir.join("summary.json"), summary_json)?;

    for entry in &report.entries {
        match &entry.outcome {
            BatchOutcome::Success(result) => write_market_dir(&batch_dir, result)?,
            BatchOutcome::Failure(failure) => {
                let dir = batch_dir.join(unique_market_slug(&batch_dir, &entry.slug));
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join("failure.json"), serde_json::to_string_pretty(failure)?)?;
            }
        }
    }

    tracing::info!(path = %batch_dir.display(), entries = report.entries.len(), "batch results written");
    Ok(batch_dir)
}

fn write_market_dir(batch_dir: &Path, result: &PipelineResult) -> EngineResult<()> {
    let dir = batch_dir.join(unique_market_slug(batch_dir, &result.market.question));
    std::fs::create_dir_all(&dir)?;

    std::fs::write(dir.join("model.py"), &result.artifact.code)?;

    let summary = ResultSummary::from(result);
    std::fs::write(dir.join("result.json"), serde_json::to_string_pretty(&summary)?)?;

    std::fs::write(dir.join("research.txt"), result.research.to_text())?;

    std::fs::write(dir.join("execution.log"), execution_log_lines(&result.execution_log)?)?;

    Ok(())
}

/// Each line is one `ExecutionLogEntry` encoded as compact JSON.
fn execution_log_lines(entries: &[ExecutionLogEntry]) -> EngineResult<String> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}

/// `slugify_question` alone can collide across markets sharing a question
/// prefix; disambiguate by appending a numeric suffix if the directory
/// already exists.
fn unique_market_slug(batch_dir: &Path, question_or_slug: &str) -> String {
    let base = slugify_question(question_or_slug);
    let base = if base.is_empty() { "market".to_string() } else { base };

    if !batch_dir.join(&base).exists() {
        return base;
    }
    for n in 2.. {
        let candidate = format!("{base}-{n}");
        if !batch_dir.join(&candidate).exists() {
            return candidate;
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{
        Explanation, FailureKind, FailureRecord, MarketDescriptor, MonteCarloMode, MonteCarloResult,
        PipelineStatus, ResearchBundle, Signal, SimulationArtifact,
    };

    fn sample_result(slug: &str, question: &str) -> PipelineResult {
        let calibration = engine_core::Calibration {
            min: 0.0,
            max: 1.0,
            mean: 0.5,
            stdev: 0.1,
            threshold: 0.5,
            verdict: engine_core::CalibrationVerdict::Accepted,
        };
        PipelineResult {
            market: MarketDescriptor::new(slug, question, 0.4),
            research: ResearchBundle {
                context: "some grounded context".into(),
                highlights: vec!["a highlight".into()],
                snippets: vec![],
            },
            artifact: SimulationArtifact::generated("def run_trial(seed):\n    return 0.5, None\n"),
            monte_carlo: Some(MonteCarloResult::from_outcomes(
                vec![true, false],
                calibration,
                0.5,
                MonteCarloMode::Threshold,
            )),
            signal: Some(Signal::BuyYes),
            explanation: Explanation {
                summary: "test summary".into(),
                description: None,
            },
            status: PipelineStatus::Succeeded,
            execution_log: vec![],
        }
    }

    #[test]
    fn writes_expected_directory_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let mut report = BatchReport::default();
        report.push_success("fed-cut-dec", sample_result("fed-cut-dec", "Will the Fed cut rates?"));
        report.push_failure(FailureRecord {
            slug: "bad-market".into(),
            kind: FailureKind::GenerationInvalid,
            reason: "boom".into(),
        });

        let timestamp = DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let batch_dir = write_batch(tmp.path(), "nightly", timestamp, &report).unwrap();

        assert!(batch_dir.join("summary.json").exists());
        assert!(batch_dir.join("will-the-fed-cut-rates").join("model.py").exists());
        assert!(batch_dir.join("will-the-fed-cut-rates").join("result.json").exists());
        assert!(batch_dir.join("will-the-fed-cut-rates").join("research.txt").exists());
        assert!(batch_dir.join("will-the-fed-cut-rates").join("execution.log").exists());
        assert!(batch_dir.join("bad-market").join("failure.json").exists());
    }

    #[test]
    fn result_json_omits_the_raw_artifact_code() {
        let tmp = tempfile::tempdir().unwrap();
        let mut report = BatchReport::default();
        report.push_success("fed-cut-dec", sample_result("fed-cut-dec", "Will the Fed cut rates?"));

        let timestamp = DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let batch_dir = write_batch(tmp.path(), "nightly", timestamp, &report).unwrap();

        let result_json =
            std::fs::read_to_string(batch_dir.join("will-the-fed-cut-rates").join("result.json")).unwrap();
        assert!(!result_json.contains("run_trial(seed)"));
    }
}
