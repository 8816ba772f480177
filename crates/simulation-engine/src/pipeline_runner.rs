use engine_core::execution_log::{DiagnosticClassification, ExecutionLogEntry, ExecutionPhase};
use engine_core::{
    Config, EngineError, MarketDescriptor, PipelineResult, PipelineStatus, ResearchBundle, Signal,
    SimulationArtifact,
};
use llm_client::{CodeGenerator, LlmProvider};
use research_adapter::{ResearchAdapter, ResearchBackend};
use sandbox_client::{Sandbox, SandboxProvider};

use crate::calibration_pass;
use crate::montecarlo_driver;
use crate::repair_loop::{self, RepairLoopOutcome};

/// Options threaded through a single market's pipeline, pulled from
/// `engine_core::Config` plus anything the caller overrides per-market.
#[derive(Clone)]
pub struct PipelineOptions {
    pub sandbox_template_id: String,
    pub sandbox_lifetime: std::time::Duration,
    pub max_repair_retries: u32,
    pub calibration_runs: usize,
    pub monte_carlo_runs: usize,
    pub signal_epsilon: f64,
    pub user_threshold: Option<f64>,
    pub probability_mode_requested: bool,
    pub fallback_artifact: Option<SimulationArtifact>,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sandbox_template_id: config.sandbox_template_id.clone(),
            sandbox_lifetime: sandbox_client::DEFAULT_SANDBOX_LIFETIME,
            max_repair_retries: config.max_repair_retries,
            calibration_runs: config.calibration_runs,
            monte_carlo_runs: config.monte_carlo_runs,
            signal_epsilon: config.signal_epsilon,
            user_threshold: None,
            probability_mode_requested: false,
            fallback_artifact: None,
        }
    }
}

/// Runs one market end to end: acquire a sandbox, run research, generate
/// and repair an artifact, calibrate it, run the Monte Carlo batch, derive
/// a signal, and release the sandbox unconditionally (spec §4 overview).
pub async fn run_pipeline<SP, RB, LP>(
    sandbox_provider: &SP,
    research_adapter: &ResearchAdapter<RB>,
    code_generator: &CodeGenerator<LP>,
    market: MarketDescriptor,
    options: PipelineOptions,
) -> Result<PipelineResult, EngineError>
where
    SP: SandboxProvider,
    RB: ResearchBackend,
    LP: LlmProvider,
{
    market
        .validate()
        .map_err(|e| EngineError::GenerationInvalid(e.to_string()))?;

    let sandbox: Sandbox = sandbox_provider
        .create(&options.sandbox_template_id, options.sandbox_lifetime)
        .await
        .map_err(|e| EngineError::ProviderUnavailable {
            provider: "sandbox".into(),
            reason: e.to_string(),
        })?;

    let result = run_pipeline_with_sandbox(
        &sandbox,
        research_adapter,
        code_generator,
        market,
        options,
    )
    .await;

    sandbox.release().await;
    result
}

async fn run_pipeline_with_sandbox<RB, LP>(
    sandbox: &Sandbox,
    research_adapter: &ResearchAdapter<RB>,
    code_generator: &CodeGenerator<LP>,
    market: MarketDescriptor,
    options: PipelineOptions,
) -> Result<PipelineResult, EngineError>
where
    RB: ResearchBackend,
    LP: LlmProvider,
{
    let research: ResearchBundle = research_adapter.research(sandbox, &market.question).await;

    let initial_artifact = code_generator.initial(&market.question, &research).await?;

    let mut execution_log = Vec::new();

    let (artifact, repair_log, repair_outcome) = repair_loop::execute_with_retry(
        sandbox,
        code_generator,
        initial_artifact,
        options.fallback_artifact,
        options.max_repair_retries,
    )
    .await;
    execution_log.extend(repair_log);

    if repair_outcome == RepairLoopOutcome::Failed {
        let description = artifact.description.clone();
        return Ok(PipelineResult {
            market,
            research,
            artifact,
            monte_carlo: None,
            signal: None,
            explanation: engine_core::Explanation {
                summary: "execution and repair attempts were exhausted without a working model"
                    .into(),
                description,
            },
            status: PipelineStatus::Failed,
            execution_log,
        });
    }

    let pre_calibration_artifact = artifact.clone();
    let calibration_outcome = calibration_pass::run_calibration(
        sandbox,
        code_generator,
        artifact,
        options.calibration_runs,
        options.user_threshold,
        &mut execution_log,
    )
    .await;

    let calibration_outcome = match calibration_outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            let description = pre_calibration_artifact.description.clone();
            return Ok(PipelineResult {
                market,
                research,
                artifact: pre_calibration_artifact,
                monte_carlo: None,
                signal: None,
                explanation: engine_core::Explanation {
                    summary: format!("calibration did not succeed: {err}"),
                    description,
                },
                status: PipelineStatus::Failed,
                execution_log,
            });
        }
    };

    let mode = montecarlo_driver::select_mode(
        &calibration_outcome.calibration,
        options.probability_mode_requested,
    );

    let monte_carlo = montecarlo_driver::run_monte_carlo(
        sandbox,
        &calibration_outcome.artifact,
        options.monte_carlo_runs,
        calibration_outcome.calibration,
        mode,
        &mut execution_log,
    )
    .await;

    let (monte_carlo, status) = match monte_carlo {
        Ok(result) => {
            let status = if repair_outcome == RepairLoopOutcome::SucceededWithFallback {
                PipelineStatus::SucceededWithFallback
            } else {
                PipelineStatus::Succeeded
            };
            (Some(result), status)
        }
        Err(EngineError::PartialMonteCarlo { failed, total }) => {
            execution_log.push(ExecutionLogEntry::new(
                0,
                ExecutionPhase::MonteCarlo,
                std::time::Duration::ZERO,
                DiagnosticClassification::RuntimeError,
                format!("{failed}/{total} trials failed"),
            ));
            (None, PipelineStatus::PartiallyFailed)
        }
        Err(err) => {
            let description = calibration_outcome.artifact.description.clone();
            return Ok(PipelineResult {
                market,
                research,
                artifact: calibration_outcome.artifact,
                monte_carlo: None,
                signal: None,
                explanation: engine_core::Explanation {
                    summary: format!("monte carlo batch failed: {err}"),
                    description,
                },
                status: PipelineStatus::Failed,
                execution_log,
            });
        }
    };

    let signal = monte_carlo
        .as_ref()
        .map(|mc| Signal::from_gap(mc.probability, market.yes_odds, options.signal_epsilon));

    let summary = match (&monte_carlo, &signal) {
        (Some(mc), Some(sig)) => format!(
            "probability={:.3} ci95={:.3} signal={sig:?}",
            mc.probability, mc.ci_95
        ),
        _ => "monte carlo batch partially failed; no signal computed".into(),
    };

    let description = calibration_outcome.artifact.description.clone();

    Ok(PipelineResult {
        market,
        research,
        artifact: calibration_outcome.artifact,
        monte_carlo,
        signal,
        explanation: engine_core::Explanation {
            summary,
            description,
        },
        status,
        execution_log,
    })
}
