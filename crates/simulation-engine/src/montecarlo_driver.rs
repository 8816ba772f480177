use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use engine_core::execution_log::{DiagnosticClassification, ExecutionLogEntry, ExecutionPhase};
use engine_core::{Calibration, EngineError, MonteCarloMode, MonteCarloResult, SimulationArtifact};
use sandbox_client::Sandbox;

use crate::trial_runner::{self, TrialAttempt, ARTIFACT_MONTE_CARLO_TIMEOUT, TRIAL_TIMEOUT};

/// Trials may fail up to this fraction of the batch before the whole
/// Monte Carlo run is treated as a partial failure (spec §4.F).
pub const MAX_FAILURE_FRACTION: f64 = 0.10;

/// Picks Threshold vs. Probability mode. Probability mode only applies
/// when the caller explicitly asked for it *and* every calibration metric
/// already lies in `[0, 1]` — there is no automatic mode switch (spec §9).
pub fn select_mode(calibration: &Calibration, probability_mode_requested: bool) -> MonteCarloMode {
    let all_metrics_in_unit_range = calibration.min >= 0.0 && calibration.max <= 1.0;
    if probability_mode_requested && all_metrics_in_unit_range {
        MonteCarloMode::Probability
    } else {
        MonteCarloMode::Threshold
    }
}

/// Runs the main Monte Carlo batch (spec §4.F): `runs` trials over seeds
/// `0..runs`, converting each raw metric into a binary outcome per `mode`.
/// Failed trials are skipped; if more than `MAX_FAILURE_FRACTION` of the
/// batch fails, returns `PartialMonteCarlo` instead of a result.
///
/// If `artifact` defines its own `run_monte_carlo`, the engine prefers it:
/// one sandbox call returns the whole outcome batch instead of `runs`
/// separate `run_trial` calls (spec §4.F, "the engine may prefer it"). A
/// failed or unparseable artifact-provided call silently falls back to the
/// synthesized per-seed loop, since the method is optional.
pub async fn run_monte_carlo(
    sandbox: &Sandbox,
    artifact: &SimulationArtifact,
    runs: usize,
    calibration: Calibration,
    mode: MonteCarloMode,
    log: &mut Vec<ExecutionLogEntry>,
) -> Result<MonteCarloResult, EngineError> {
    let artifact_outcomes = if artifact.provides_run_monte_carlo() {
        trial_runner::run_artifact_monte_carlo(
            sandbox,
            runs,
            calibration.threshold,
            ARTIFACT_MONTE_CARLO_TIMEOUT,
        )
        .await
    } else {
        None
    };

    let (outcomes, failed) = match artifact_outcomes {
        Some(outcomes) => {
            log.push(ExecutionLogEntry::new(
                0,
                ExecutionPhase::MonteCarlo,
                std::time::Duration::ZERO,
                DiagnosticClassification::Success,
                "used artifact-provided run_monte_carlo".into(),
            ));
            (outcomes, 0)
        }
        None => run_synthesized_batch(sandbox, runs, calibration.threshold, mode, log).await,
    };

    if runs > 0 && failed as f64 / runs as f64 > MAX_FAILURE_FRACTION {
        return Err(EngineError::PartialMonteCarlo { failed, total: runs });
    }

    log.push(ExecutionLogEntry::new(
        0,
        ExecutionPhase::MonteCarlo,
        std::time::Duration::ZERO,
        DiagnosticClassification::Success,
        format!("{} of {} trials succeeded", outcomes.len(), runs),
    ));

    Ok(MonteCarloResult::from_outcomes(
        outcomes,
        calibration,
        calibration.threshold,
        mode,
    ))
}

async fn run_synthesized_batch(
    sandbox: &Sandbox,
    runs: usize,
    threshold: f64,
    mode: MonteCarloMode,
    log: &mut Vec<ExecutionLogEntry>,
) -> (Vec<bool>, usize) {
    let mut outcomes = Vec::with_capacity(runs);
    let mut failed = 0usize;

    for seed in 0..runs as u64 {
        match trial_runner::run_trial(sandbox, seed, TRIAL_TIMEOUT).await {
            TrialAttempt::Ok(outcome) => {
                let success = to_binary_outcome(outcome.metric, threshold, mode, seed);
                outcomes.push(success);
            }
            TrialAttempt::Failed { classification, exec } => {
                failed += 1;
                log.push(ExecutionLogEntry::new(
                    seed as u32,
                    ExecutionPhase::MonteCarlo,
                    std::time::Duration::ZERO,
                    classification,
                    exec.stderr_tail(),
                ));
            }
        }
    }

    (outcomes, failed)
}

fn to_binary_outcome(metric: f64, threshold: f64, mode: MonteCarloMode, seed: u64) -> bool {
    match mode {
        MonteCarloMode::Threshold => metric > threshold,
        MonteCarloMode::Probability => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.gen::<f64>() < metric.clamp(0.0, 1.0)
        }
    }
}
