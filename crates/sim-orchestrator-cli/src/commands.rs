use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use engine_core::{BatchOutcome, Config, FailureKind, MarketDescriptor};
use llm_client::{CodeGenerator, HttpLlmProvider};
use research_adapter::{HttpResearchBackend, ResearchAdapter};
use sandbox_client::{HttpSandboxProvider, SandboxProvider, DEFAULT_SANDBOX_LIFETIME};
use simulation_engine::PipelineOptions;

/// Process exit codes (spec §6): 0 success, 2 invalid input, 3 every
/// failure was a provider outage, 4 a mixed batch (some markets
/// succeeded, some failed for other reasons), 5 total failure.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_INVALID_INPUT: i32 = 2;
pub const EXIT_PROVIDER_UNAVAILABLE: i32 = 3;
pub const EXIT_PARTIAL_FAILURE: i32 = 4;
pub const EXIT_TOTAL_FAILURE: i32 = 5;

pub async fn run(markets_path: String, label: String, output_dir: PathBuf) -> i32 {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration error");
            return EXIT_INVALID_INPUT;
        }
    };

    let markets = match load_markets(&markets_path) {
        Ok(markets) if markets.is_empty() => {
            tracing::error!("market list is empty");
            return EXIT_INVALID_INPUT;
        }
        Ok(markets) => markets,
        Err(err) => {
            tracing::error!(error = %err, "could not read market list");
            return EXIT_INVALID_INPUT;
        }
    };

    let sandbox_provider = Arc::new(HttpSandboxProvider::new(
        config.sandbox_base_url.clone(),
        config.sandbox_api_key.clone(),
    ));
    let research_adapter = Arc::new(ResearchAdapter::with_backend(HttpResearchBackend::default()));
    let code_generator = Arc::new(CodeGenerator::new(
        HttpLlmProvider::new(config.llm_base_url.clone(), config.llm_api_key.clone()),
        config.llm_model_id.clone(),
    ));
    let options = PipelineOptions::from_config(&config);
    let concurrency = config.batch_concurrency;

    let report = batch_scheduler::run_batch(
        sandbox_provider,
        research_adapter,
        code_generator,
        markets,
        options,
        concurrency,
        Arc::new(AtomicBool::new(false)),
    )
    .await;

    let total = report.entries.len();
    let failures = report.failure_count();

    let exit_code = if failures == 0 {
        EXIT_SUCCESS
    } else if failures == total {
        if all_provider_unavailable(&report) {
            EXIT_PROVIDER_UNAVAILABLE
        } else {
            EXIT_TOTAL_FAILURE
        }
    } else {
        EXIT_PARTIAL_FAILURE
    };

    let timestamp = chrono::Utc::now();
    match result_assembler::write_batch(&output_dir, &label, timestamp, &report) {
        Ok(path) => tracing::info!(path = %path.display(), failures, total, "batch complete"),
        Err(err) => {
            tracing::error!(error = %err, "failed to write batch results");
            return EXIT_TOTAL_FAILURE;
        }
    }

    exit_code
}

pub async fn replay(market: String, artifact_path: PathBuf, threshold: f64, runs: usize) -> i32 {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration error");
            return EXIT_INVALID_INPUT;
        }
    };

    let code = match std::fs::read_to_string(&artifact_path) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, path = %artifact_path.display(), "could not read artifact");
            return EXIT_INVALID_INPUT;
        }
    };
    let artifact = engine_core::SimulationArtifact::generated(code);

    let sandbox_provider = HttpSandboxProvider::new(config.sandbox_base_url, config.sandbox_api_key);
    let sandbox = match sandbox_provider
        .create(&config.sandbox_template_id, DEFAULT_SANDBOX_LIFETIME)
        .await
    {
        Ok(sandbox) => sandbox,
        Err(err) => {
            tracing::error!(error = %err, "sandbox provider unavailable");
            return EXIT_PROVIDER_UNAVAILABLE;
        }
    };

    let calibration = engine_core::Calibration {
        min: 0.0,
        max: 1.0,
        mean: threshold,
        stdev: 0.0,
        threshold,
        verdict: engine_core::CalibrationVerdict::Accepted,
    };

    let result = replay_inner(&sandbox, &artifact, calibration, runs).await;
    sandbox.release().await;

    match result {
        Ok(monte_carlo) => {
            tracing::info!(
                market,
                probability = monte_carlo.probability,
                ci_95 = monte_carlo.ci_95,
                n_runs = monte_carlo.n_runs,
                "replay complete"
            );
            EXIT_SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, market, "replay failed");
            EXIT_TOTAL_FAILURE
        }
    }
}

async fn replay_inner(
    sandbox: &sandbox_client::Sandbox,
    artifact: &engine_core::SimulationArtifact,
    calibration: engine_core::Calibration,
    runs: usize,
) -> Result<engine_core::MonteCarloResult, engine_core::EngineError> {
    simulation_engine::trial_runner::write_artifact(sandbox, artifact)
        .await
        .map_err(|e| engine_core::EngineError::ExecutionFailure(e.to_string()))?;

    let mut log = Vec::new();
    simulation_engine::montecarlo_driver::run_monte_carlo(
        sandbox,
        artifact,
        runs,
        calibration,
        engine_core::MonteCarloMode::Threshold,
        &mut log,
    )
    .await
}

fn all_provider_unavailable(report: &engine_core::BatchReport) -> bool {
    report.entries.iter().all(|entry| {
        matches!(
            &entry.outcome,
            BatchOutcome::Failure(record) if record.kind == FailureKind::ProviderUnavailable
        )
    })
}

fn load_markets(path: &str) -> Result<Vec<MarketDescriptor>, String> {
    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| e.to_string())?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| e.to_string())?
    };

    serde_json::from_str::<Vec<MarketDescriptor>>(&text).map_err(|e| e.to_string())
}
