use engine_core::execution_log::{DiagnosticClassification, ExecutionLogEntry, ExecutionPhase};
use engine_core::{Calibration, CalibrationVerdict, EngineError, SimulationArtifact};
use llm_client::{CodeGenerator, LlmProvider};
use sandbox_client::Sandbox;

use crate::trial_runner::{self, TrialAttempt, TRIAL_TIMEOUT};

pub const MIN_CALIBRATION_RUNS: usize = 5;

pub struct CalibrationOutcome {
    pub artifact: SimulationArtifact,
    pub calibration: Calibration,
}

/// Runs the Calibration Pass (spec §4.E): `runs` trials over seeds
/// `0..runs`, computes min/max/mean/stdev, and rejects a degenerate or
/// low-variance model by asking the generator for one re-roll before
/// giving up. A single non-finite metric during calibration escalates
/// immediately rather than being silently dropped.
pub async fn run_calibration<P: LlmProvider>(
    sandbox: &Sandbox,
    generator: &CodeGenerator<P>,
    artifact: SimulationArtifact,
    runs: usize,
    user_threshold: Option<f64>,
    log: &mut Vec<ExecutionLogEntry>,
) -> Result<CalibrationOutcome, EngineError> {
    if runs < MIN_CALIBRATION_RUNS {
        return Err(EngineError::CalibrationTooSmall(runs));
    }

    let mut current = artifact;

    for regeneration_attempt in 0..2 {
        trial_runner::write_artifact(sandbox, &current)
            .await
            .map_err(|e| EngineError::ExecutionFailure(e.to_string()))?;

        let metrics = match collect_metrics(sandbox, runs, log).await? {
            Some(metrics) => metrics,
            None => {
                // a non-finite metric surfaced mid-pass; escalate to repair
                // rather than trusting a partial calibration.
                return Err(EngineError::ExecutionFailure(
                    "non-finite metric observed during calibration".into(),
                ));
            }
        };

        let calibration = Calibration::from_metrics(&metrics, user_threshold);

        log.push(ExecutionLogEntry::new(
            regeneration_attempt,
            ExecutionPhase::Calibration,
            std::time::Duration::ZERO,
            if calibration.verdict.is_accepted() {
                DiagnosticClassification::Success
            } else {
                DiagnosticClassification::InsufficientStochasticity
            },
            format!(
                "calibration verdict={:?} min={:.4} max={:.4} mean={:.4} stdev={:.4}",
                calibration.verdict, calibration.min, calibration.max, calibration.mean, calibration.stdev
            ),
        ));

        if calibration.verdict.is_accepted() {
            return Ok(CalibrationOutcome {
                artifact: current,
                calibration,
            });
        }

        if regeneration_attempt == 1 {
            let reason = match calibration.verdict {
                CalibrationVerdict::RejectedDegenerate => "model produced a degenerate (constant) metric",
                CalibrationVerdict::RejectedLowVariance => "model produced insufficient stochastic variance",
                CalibrationVerdict::Accepted => unreachable!(),
            };
            return Err(EngineError::CalibrationRejection(reason.into()));
        }

        current = generator.regenerate_for_stochasticity(&current).await?;
    }

    unreachable!("loop always returns within two iterations")
}

async fn collect_metrics(
    sandbox: &Sandbox,
    runs: usize,
    log: &mut Vec<ExecutionLogEntry>,
) -> Result<Option<Vec<f64>>, EngineError> {
    let mut metrics = Vec::with_capacity(runs);

    for seed in 0..runs as u64 {
        match trial_runner::run_trial(sandbox, seed, TRIAL_TIMEOUT).await {
            TrialAttempt::Ok(outcome) => metrics.push(outcome.metric),
            TrialAttempt::Failed { classification, exec } => {
                log.push(ExecutionLogEntry::new(
                    seed as u32,
                    ExecutionPhase::Calibration,
                    std::time::Duration::ZERO,
                    classification,
                    exec.stderr_tail(),
                ));
                if classification == DiagnosticClassification::NonFiniteMetric {
                    return Ok(None);
                }
                return Err(EngineError::ExecutionFailure(format!(
                    "calibration trial seed={seed} failed: {classification:?}"
                )));
            }
        }
    }

    Ok(Some(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm_client::LlmResult;
    use sandbox_client::{MockSandboxProvider, SandboxProvider, DEFAULT_SANDBOX_LIFETIME};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct NeverCalledProvider;

    #[async_trait]
    impl LlmProvider for NeverCalledProvider {
        async fn complete(&self, _s: &str, _u: &str, _m: &str) -> LlmResult<String> {
            panic!("generator should not be invoked when calibration is accepted")
        }
    }

    #[tokio::test]
    async fn accepts_a_well_spread_model() {
        let provider = MockSandboxProvider::new(|_, _| {
            static SEED_SEQ: AtomicU64 = AtomicU64::new(0);
            let n = SEED_SEQ.fetch_add(1, Ordering::SeqCst);
            Ok(sandbox_client::ExecResult {
                exit_code: 0,
                stdout: format!("{{\"metric\": {}}}", 0.1 + (n % 10) as f64 * 0.05),
                stderr: String::new(),
                structured_result: None,
            })
        });
        let sandbox = provider.create("t", DEFAULT_SANDBOX_LIFETIME).await.unwrap();
        let generator = CodeGenerator::new(NeverCalledProvider, "gpt-4o");
        let artifact = SimulationArtifact::generated("def run_trial(seed):\n    return seed, None\n");
        let mut log = Vec::new();

        let outcome = run_calibration(&sandbox, &generator, artifact, 10, None, &mut log)
            .await
            .unwrap();

        assert!(outcome.calibration.verdict.is_accepted());
    }

    #[tokio::test]
    async fn too_few_runs_is_rejected_up_front() {
        let provider = MockSandboxProvider::new(|_, _| {
            Ok(sandbox_client::ExecResult {
                exit_code: 0,
                stdout: "{\"metric\": 0.5}".into(),
                stderr: String::new(),
                structured_result: None,
            })
        });
        let sandbox = provider.create("t", DEFAULT_SANDBOX_LIFETIME).await.unwrap();
        let generator = CodeGenerator::new(NeverCalledProvider, "gpt-4o");
        let artifact = SimulationArtifact::generated("def run_trial(seed):\n    return seed, None\n");
        let mut log = Vec::new();

        let err = run_calibration(&sandbox, &generator, artifact, 2, None, &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::CalibrationTooSmall(2)));
    }

    #[tokio::test]
    async fn degenerate_model_is_rejected_after_one_regeneration() {
        let attempt = Arc::new(AtomicU64::new(0));
        let attempt_for_closure = attempt.clone();
        let provider = MockSandboxProvider::new(move |_, _| {
            attempt_for_closure.fetch_add(1, Ordering::SeqCst);
            Ok(sandbox_client::ExecResult {
                exit_code: 0,
                stdout: "{\"metric\": 0.5}".into(),
                stderr: String::new(),
                structured_result: None,
            })
        });
        let sandbox = provider.create("t", DEFAULT_SANDBOX_LIFETIME).await.unwrap();

        struct EchoProvider;
        #[async_trait]
        impl LlmProvider for EchoProvider {
            async fn complete(&self, _s: &str, _u: &str, _m: &str) -> LlmResult<String> {
                Ok("def run_trial(seed):\n    return seed, None\n".into())
            }
        }
        let generator = CodeGenerator::new(EchoProvider, "gpt-4o");
        let artifact = SimulationArtifact::generated("def run_trial(seed):\n    return seed, None\n");
        let mut log = Vec::new();

        let err = run_calibration(&sandbox, &generator, artifact, 10, None, &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::CalibrationRejection(_)));
        // 10 trials for the initial pass + 10 for the single re-roll
        assert_eq!(attempt.load(Ordering::SeqCst), 20);
    }
}
