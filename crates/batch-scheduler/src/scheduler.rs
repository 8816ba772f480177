use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use engine_core::{BatchReport, EngineError, FailureKind, FailureRecord, MarketDescriptor};
use llm_client::LlmProvider;
use research_adapter::{ResearchAdapter, ResearchBackend};
use sandbox_client::SandboxProvider;
use simulation_engine::PipelineOptions;

const TASK_INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const TASK_MAX_BACKOFF: Duration = Duration::from_secs(30);
const TASK_MAX_RETRIES: u32 = 3;

/// Runs a whole batch of markets with bounded concurrency (spec §4.G),
/// mirroring `data-loader::main`'s semaphore-gated `tokio::spawn` fan-out,
/// generalized from a fixed per-symbol pipeline to an arbitrary async
/// task per market plus per-task retry/backoff.
///
/// `cancelled` is checked before a task acquires its permit and again
/// right after; tasks already running are allowed to finish (each one
/// always releases its own sandbox on every exit path, spawned tasks are
/// never aborted mid-flight). Selection order is preserved in the
/// returned `BatchReport` regardless of completion order.
pub async fn run_batch<SP, RB, LP>(
    sandbox_provider: Arc<SP>,
    research_adapter: Arc<ResearchAdapter<RB>>,
    code_generator: Arc<llm_client::CodeGenerator<LP>>,
    markets: Vec<MarketDescriptor>,
    pipeline_options: PipelineOptions,
    concurrency: usize,
    cancelled: Arc<AtomicBool>,
) -> BatchReport
where
    SP: SandboxProvider + Send + Sync + 'static,
    RB: ResearchBackend + Send + Sync + 'static,
    LP: LlmProvider + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = markets.len();
    let completed = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::with_capacity(total);
    let mut order = Vec::with_capacity(total);

    for market in markets {
        let slug = market.slug.clone();
        order.push(slug.clone());

        let sandbox_provider = sandbox_provider.clone();
        let research_adapter = research_adapter.clone();
        let code_generator = code_generator.clone();
        let options = pipeline_options.clone();
        let semaphore = semaphore.clone();
        let cancelled = cancelled.clone();
        let completed = completed.clone();

        let handle = tokio::spawn(async move {
            if cancelled.load(Ordering::SeqCst) {
                return early_cancellation(&slug);
            }

            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return FailureRecord {
                        slug,
                        kind: FailureKind::TaskFailure,
                        reason: "scheduler semaphore closed".into(),
                    }
                    .into()
                }
            };

            if cancelled.load(Ordering::SeqCst) {
                return early_cancellation(&slug);
            }

            let outcome = run_one_market_with_retry(
                sandbox_provider.as_ref(),
                research_adapter.as_ref(),
                code_generator.as_ref(),
                market,
                options,
            )
            .await;

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            match &outcome {
                Outcome::Success(_) => tracing::info!(slug = %slug, done, total, "market pipeline succeeded"),
                Outcome::Failure(rec) => {
                    tracing::warn!(slug = %slug, done, total, reason = %rec.reason, "market pipeline failed")
                }
            }
            outcome
        });

        handles.push(handle);
    }

    let mut outcomes = Vec::with_capacity(total);
    for handle in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Outcome::Failure(FailureRecord {
                slug: "<unknown>".into(),
                kind: FailureKind::TaskFailure,
                reason: format!("task panicked: {join_err}"),
            }),
        };
        outcomes.push(outcome);
    }

    let mut report = BatchReport::default();
    for (slug, outcome) in order.into_iter().zip(outcomes) {
        match outcome {
            Outcome::Success(result) => report.push_success(slug, *result),
            Outcome::Failure(record) => report.push_failure(record),
        }
    }
    report
}

enum Outcome {
    Success(Box<engine_core::PipelineResult>),
    Failure(FailureRecord),
}

impl From<FailureRecord> for Outcome {
    fn from(record: FailureRecord) -> Self {
        Outcome::Failure(record)
    }
}

fn early_cancellation(slug: &str) -> Outcome {
    Outcome::Failure(FailureRecord {
        slug: slug.to_string(),
        kind: FailureKind::TaskFailure,
        reason: "batch cancelled before this task started".into(),
    })
}

async fn run_one_market_with_retry<SP, RB, LP>(
    sandbox_provider: &SP,
    research_adapter: &ResearchAdapter<RB>,
    code_generator: &llm_client::CodeGenerator<LP>,
    market: MarketDescriptor,
    options: PipelineOptions,
) -> Outcome
where
    SP: SandboxProvider,
    RB: ResearchBackend,
    LP: LlmProvider,
{
    let mut backoff = TASK_INITIAL_BACKOFF;
    let mut last_err: Option<EngineError> = None;

    for attempt in 0..=TASK_MAX_RETRIES {
        let attempt_options = options.clone();
        match simulation_engine::run_pipeline(
            sandbox_provider,
            research_adapter,
            code_generator,
            market.clone(),
            attempt_options,
        )
        .await
        {
            Ok(result) => return Outcome::Success(Box::new(result)),
            Err(err @ EngineError::ProviderUnavailable { .. }) if attempt < TASK_MAX_RETRIES => {
                tracing::warn!(slug = %market.slug, attempt, error = %err, "pipeline provider unavailable, retrying");
                last_err = Some(err);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(TASK_MAX_BACKOFF);
            }
            Err(err) => {
                return Outcome::Failure(FailureRecord {
                    slug: market.slug.clone(),
                    kind: classify_failure(&err),
                    reason: err.to_string(),
                });
            }
        }
    }

    Outcome::Failure(FailureRecord {
        slug: market.slug,
        kind: FailureKind::ProviderUnavailable,
        reason: last_err.map(|e| e.to_string()).unwrap_or_default(),
    })
}

fn classify_failure(err: &EngineError) -> FailureKind {
    match err {
        EngineError::ProviderUnavailable { .. } => FailureKind::ProviderUnavailable,
        EngineError::ProviderUnauthorized { .. } => FailureKind::TaskFailure,
        EngineError::GenerationInvalid(_) => FailureKind::GenerationInvalid,
        EngineError::ExecutionFailure(_) => FailureKind::ExecutionFailure,
        EngineError::CalibrationRejection(_) | EngineError::CalibrationTooSmall(_) => {
            FailureKind::CalibrationRejection
        }
        _ => FailureKind::TaskFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::{Config, PipelineStatus};
    use llm_client::{CodeGenerator, LlmResult};
    use research_adapter::{ResearchError, ResearchResult};
    use sandbox_client::{ExecResult, MockSandboxProvider};
    use std::sync::atomic::AtomicU64 as StdAtomicU64;

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
        async fn call(
            &self,
            _url: &str,
            _token: &str,
            _question: &str,
        ) -> ResearchResult<engine_core::ResearchBundle> {
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
            batch_concurrency: 4,
            monte_carlo_runs: 20,
            calibration_runs: 10,
            max_repair_retries: 5,
            signal_epsilon: 0.05,
        }
    }

    #[tokio::test]
    async fn preserves_selection_order_regardless_of_completion_order() {
        let sandbox_provider = Arc::new(MockSandboxProvider::new(|_, _| {
            static SEED_SEQ: StdAtomicU64 = StdAtomicU64::new(0);
            let n = SEED_SEQ.fetch_add(1, Ordering::SeqCst);
            let metric = (n % 10) as f64 / 10.0 + 0.01;
            Ok(ExecResult {
                exit_code: 0,
                stdout: format!("{{\"metric\": {metric}}}"),
                stderr: String::new(),
                structured_result: None,
            })
        }));
        let research_adapter = Arc::new(ResearchAdapter::with_backend(EmptyResearchBackend));
        let code_generator = Arc::new(CodeGenerator::new(ScriptedGenerator, "gpt-4o"));
        let markets = vec![
            MarketDescriptor::new("m-a", "Will A happen?", 0.3),
            MarketDescriptor::new("m-b", "Will B happen?", 0.5),
            MarketDescriptor::new("m-c", "Will C happen?", 0.7),
        ];
        let options = PipelineOptions::from_config(&sample_config());

        let report = run_batch(
            sandbox_provider,
            research_adapter,
            code_generator,
            markets,
            options,
            2,
            Arc::new(AtomicBool::new(false)),
        )
        .await;

        let slugs: Vec<&str> = report.entries.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["m-a", "m-b", "m-c"]);
        assert!(!report.has_any_failure());
    }

    #[tokio::test]
    async fn one_markets_failure_does_not_affect_others() {
        let sandbox_provider = Arc::new(MockSandboxProvider::new(|_, _| {
            Ok(ExecResult {
                exit_code: 0,
                stdout: "{\"metric\": 0.42}".into(),
                stderr: String::new(),
                structured_result: None,
            })
        }));
        let research_adapter = Arc::new(ResearchAdapter::with_backend(EmptyResearchBackend));
        let code_generator = Arc::new(CodeGenerator::new(ScriptedGenerator, "gpt-4o"));
        let markets = vec![
            MarketDescriptor::new("good-market", "Will it happen?", 0.3),
            MarketDescriptor::new("", "", 5.0), // invalid market -> GenerationInvalid
        ];
        let options = PipelineOptions::from_config(&sample_config());

        let report = run_batch(
            sandbox_provider,
            research_adapter,
            code_generator,
            markets,
            options,
            2,
            Arc::new(AtomicBool::new(false)),
        )
        .await;

        assert_eq!(report.entries.len(), 2);
        assert!(report.has_any_failure());
        assert_eq!(report.failure_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_start_skips_remaining_tasks() {
        let sandbox_provider = Arc::new(MockSandboxProvider::always_unavailable());
        let research_adapter = Arc::new(ResearchAdapter::with_backend(EmptyResearchBackend));
        let code_generator = Arc::new(CodeGenerator::new(ScriptedGenerator, "gpt-4o"));
        let markets = vec![MarketDescriptor::new("m-a", "Will A happen?", 0.3)];
        let options = PipelineOptions::from_config(&sample_config());

        let report = run_batch(
            sandbox_provider,
            research_adapter,
            code_generator,
            markets,
            options,
            2,
            Arc::new(AtomicBool::new(true)),
        )
        .await;

        assert_eq!(report.failure_count(), 1);
    }
}
