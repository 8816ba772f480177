use std::time::Instant;

use engine_core::execution_log::{DiagnosticClassification, ExecutionLogEntry, ExecutionPhase};
use engine_core::SimulationArtifact;
use llm_client::{CodeGenerator, FailureContext, LlmProvider};
use sandbox_client::Sandbox;

use crate::trial_runner::{self, TrialAttempt, SMOKE_TEST_TIMEOUT};

pub const DEFAULT_MAX_REPAIR_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairLoopOutcome {
    Succeeded,
    SucceededWithFallback,
    Failed,
}

fn classification_label(classification: DiagnosticClassification) -> &'static str {
    match classification {
        DiagnosticClassification::Success => "success",
        DiagnosticClassification::CompileOrParseError => "compile_or_parse_error",
        DiagnosticClassification::RuntimeError => "runtime_error",
        DiagnosticClassification::Timeout => "timeout",
        DiagnosticClassification::NonFiniteMetric => "non_finite_metric",
        DiagnosticClassification::StructuralViolation => "structural_violation",
        DiagnosticClassification::InsufficientStochasticity => "insufficient_stochasticity",
    }
}

/// Runs the Execution & Repair Loop state machine (spec §4.D):
/// `Generated -> Executed -> {Succeeded*, FailedWithDiagnostics ->
/// Repairing -> Generated}`, bounded by `max_retries`. Exceeding the bound
/// is `Succeeded*` if `fallback_artifact` was supplied, else `Failed*`.
pub async fn execute_with_retry<P: LlmProvider>(
    sandbox: &Sandbox,
    generator: &CodeGenerator<P>,
    initial_artifact: SimulationArtifact,
    fallback_artifact: Option<SimulationArtifact>,
    max_retries: u32,
) -> (SimulationArtifact, Vec<ExecutionLogEntry>, RepairLoopOutcome) {
    let mut current = initial_artifact;
    let mut log = Vec::new();
    let mut attempt_index: u32 = 0;

    loop {
        let started = Instant::now();

        let violations = current.structural_violations();
        let (classification, exit_code, stdout_tail, stderr_tail) = if !violations.is_empty() {
            (
                DiagnosticClassification::StructuralViolation,
                -1,
                String::new(),
                violations.join("; "),
            )
        } else if let Err(err) = trial_runner::write_artifact(sandbox, &current).await {
            (
                DiagnosticClassification::RuntimeError,
                -1,
                String::new(),
                format!("failed to write artifact to sandbox: {err}"),
            )
        } else {
            match trial_runner::run_trial(sandbox, 0, SMOKE_TEST_TIMEOUT).await {
                TrialAttempt::Ok(_) => {
                    log.push(ExecutionLogEntry::new(
                        attempt_index,
                        ExecutionPhase::SmokeTest,
                        started.elapsed(),
                        DiagnosticClassification::Success,
                        "smoke test passed",
                    ));
                    return (current, log, RepairLoopOutcome::Succeeded);
                }
                TrialAttempt::Failed { classification, exec } => {
                    (classification, exec.exit_code, exec.stdout_tail(), exec.stderr_tail())
                }
            }
        };

        log.push(ExecutionLogEntry::new(
            attempt_index,
            ExecutionPhase::SmokeTest,
            started.elapsed(),
            classification,
            stderr_tail.clone(),
        ));

        if attempt_index + 1 >= max_retries {
            return exhaust(current, fallback_artifact, log);
        }

        let failure = FailureContext {
            exit_code,
            stdout_tail,
            stderr_tail,
            phase: ExecutionPhase::Repair,
            classification_label: classification_label(classification).to_string(),
        };

        match generator.repair(&current, &failure).await {
            Ok(repaired) => {
                current = repaired;
                attempt_index += 1;
            }
            Err(err) => {
                tracing::warn!(error = %err, "generator unavailable during repair");
                return exhaust(current, fallback_artifact, log);
            }
        }
    }
}

fn exhaust(
    current: SimulationArtifact,
    fallback_artifact: Option<SimulationArtifact>,
    mut log: Vec<ExecutionLogEntry>,
) -> (SimulationArtifact, Vec<ExecutionLogEntry>, RepairLoopOutcome) {
    match fallback_artifact {
        Some(fallback) => {
            log.push(ExecutionLogEntry::new(
                log.len() as u32,
                ExecutionPhase::FallbackUsed,
                std::time::Duration::ZERO,
                DiagnosticClassification::Success,
                "repair retries exhausted; using supplied fallback artifact",
            ));
            (fallback, log, RepairLoopOutcome::SucceededWithFallback)
        }
        None => (current, log, RepairLoopOutcome::Failed),
    }
}
