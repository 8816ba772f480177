//! Execution & Repair Loop, Calibration Pass, and Monte Carlo Driver (spec
//! §4.D/E/F), plus the per-market pipeline that sequences them.

pub mod calibration_pass;
pub mod montecarlo_driver;
pub mod pipeline_runner;
pub mod repair_loop;
pub mod trial_runner;

pub use calibration_pass::{CalibrationOutcome, MIN_CALIBRATION_RUNS};
pub use montecarlo_driver::{select_mode, MAX_FAILURE_FRACTION};
pub use pipeline_runner::{run_pipeline, PipelineOptions};
pub use repair_loop::{RepairLoopOutcome, DEFAULT_MAX_REPAIR_RETRIES};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::{Config, MarketDescriptor, PipelineStatus};
    use llm_client::{CodeGenerator, LlmProvider, LlmResult};
    use research_adapter::{ResearchAdapter, ResearchBackend, ResearchError, ResearchResult};
    use sandbox_client::{ExecResult, MockSandboxProvider, SandboxProvider};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ScriptedGenerator;

    #[async_trait]
    impl LlmProvider for ScriptedGenerator {
        async fn complete(&self, _s: &str, _u: &str, _m: &str) -> LlmResult<String> {
            Ok("def run_trial(seed):\n    return (seed % 10) / 10.0 + 0.01, None\n".into())
        }
    }

    struct EmptyResearchBackend;

    #[async_trait]
    impl ResearchBackend for EmptyResearchBackend {
        async fn call(&self, _url: &str, _token: &str, _question: &str) -> ResearchResult<engine_core::ResearchBundle> {
            Err(ResearchError::Unavailable("no research backend in this test".into()))
        }
    }

    fn sample_config() -> Config {
        Config {
            llm_api_key: "k".into(),
            llm_base_url: "http://localhost".into(),
            llm_model_id: "gpt-4o".into(),
            sandbox_api_key: "k".into(),
            sandbox_base_url: "http://localhost".into(),
            sandbox_template_id: "default".into(),
            research_api_key: "k".into(),
            batch_concurrency: 10,
            monte_carlo_runs: 20,
            calibration_runs: 10,
            max_repair_retries: 5,
            signal_epsilon: 0.05,
        }
    }

    #[tokio::test]
    async fn happy_path_produces_a_signal() {
        let sandbox_provider = MockSandboxProvider::new(|_, _| {
            static SEED_SEQ: AtomicU64 = AtomicU64::new(0);
            let n = SEED_SEQ.fetch_add(1, Ordering::SeqCst);
            let metric = (n % 10) as f64 / 10.0 + 0.01;
            Ok(ExecResult {
                exit_code: 0,
                stdout: format!("{{\"metric\": {metric}}}"),
                stderr: String::new(),
                structured_result: None,
            })
        });
        let research_adapter = ResearchAdapter::with_backend(EmptyResearchBackend);
        let code_generator = CodeGenerator::new(ScriptedGenerator, "gpt-4o");
        let market = MarketDescriptor::new("fed-cut-dec", "Will the Fed cut rates?", 0.4);
        let options = PipelineOptions::from_config(&sample_config());

        let result = run_pipeline(&sandbox_provider, &research_adapter, &code_generator, market, options)
            .await
            .unwrap();

        assert_eq!(result.status, PipelineStatus::Succeeded);
        assert!(result.monte_carlo.is_some());
        assert!(result.signal.is_some());
    }

    #[tokio::test]
    async fn invalid_market_is_rejected_before_any_sandbox_use() {
        let sandbox_provider = MockSandboxProvider::always_unavailable();
        let research_adapter = ResearchAdapter::with_backend(EmptyResearchBackend);
        let code_generator = CodeGenerator::new(ScriptedGenerator, "gpt-4o");
        let market = MarketDescriptor::new("", "", 2.0);
        let options = PipelineOptions::from_config(&sample_config());

        let err = run_pipeline(&sandbox_provider, &research_adapter, &code_generator, market, options)
            .await
            .unwrap_err();

        assert!(matches!(err, engine_core::EngineError::GenerationInvalid(_)));
    }
}
