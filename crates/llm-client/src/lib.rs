//! Code Generator: authors and repairs `SimulationArtifact`s via an LLM
//! provider (spec §4.C).

pub mod error;
pub mod generator;
pub mod prompts;
pub mod provider;

pub use error::{LlmError, LlmResult};
pub use generator::{CodeGenerator, FailureContext};
pub use provider::{HttpLlmProvider, LlmProvider};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::execution_log::ExecutionPhase;
    use engine_core::ResearchBundle;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ScriptedProvider {
        responses: Vec<&'static str>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, _system: &str, _user: &str, _model: &str) -> LlmResult<String> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self.responses[idx.min(self.responses.len() - 1)].to_string())
        }
    }

    #[tokio::test]
    async fn initial_produces_an_artifact_from_the_response_text() {
        let provider = ScriptedProvider {
            responses: vec!["def run_trial(seed):\n    return 0.5, None\n"],
            calls: Arc::new(AtomicU32::new(0)),
        };
        let generator = CodeGenerator::new(provider, "gpt-4o");
        let artifact = generator
            .initial("Will the Fed cut rates?", &ResearchBundle::empty())
            .await
            .unwrap();
        assert!(artifact.code.contains("run_trial"));
        assert!(!artifact.is_fallback);
    }

    #[tokio::test]
    async fn initial_parses_the_self_description_line() {
        let provider = ScriptedProvider {
            responses: vec![
                "# SELF_DESCRIPTION: {\"agent_classes\": [\"Trader\"], \"approximate_counts\": [[\"Trader\", 500]], \"rationale\": \"simple herd model\", \"outcome_interpretation\": \"high probability of YES\"}\n\
                 def run_trial(seed):\n    return 0.5, None\n",
            ],
            calls: Arc::new(AtomicU32::new(0)),
        };
        let generator = CodeGenerator::new(provider, "gpt-4o");
        let artifact = generator
            .initial("Will the Fed cut rates?", &ResearchBundle::empty())
            .await
            .unwrap();
        let description = artifact.description.expect("description should be parsed");
        assert_eq!(description.agent_classes, vec!["Trader".to_string()]);
        assert_eq!(description.approximate_counts, vec![("Trader".to_string(), 500)]);
    }

    #[tokio::test]
    async fn initial_without_a_self_description_line_has_no_description() {
        let provider = ScriptedProvider {
            responses: vec!["def run_trial(seed):\n    return 0.5, None\n"],
            calls: Arc::new(AtomicU32::new(0)),
        };
        let generator = CodeGenerator::new(provider, "gpt-4o");
        let artifact = generator
            .initial("Will the Fed cut rates?", &ResearchBundle::empty())
            .await
            .unwrap();
        assert!(artifact.description.is_none());
    }

    struct UnauthorizedProvider {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmProvider for UnauthorizedProvider {
        async fn complete(&self, _system: &str, _user: &str, _model: &str) -> LlmResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Unauthorized("invalid api key".into()))
        }
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried_and_surfaces_as_a_task_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = CodeGenerator::new(UnauthorizedProvider { calls: calls.clone() }, "gpt-4o");
        let err = generator
            .initial("Will the Fed cut rates?", &ResearchBundle::empty())
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, engine_core::EngineError::ProviderUnauthorized { .. }));
    }

    #[tokio::test]
    async fn repair_replaces_the_artifact() {
        let provider = ScriptedProvider {
            responses: vec!["def run_trial(seed):\n    return 0.6, None\n"],
            calls: Arc::new(AtomicU32::new(0)),
        };
        let generator = CodeGenerator::new(provider, "gpt-4o");
        let previous = engine_core::SimulationArtifact::generated("def run_trial(seed): bad syntax");
        let repaired = generator
            .repair(
                &previous,
                &FailureContext {
                    exit_code: 1,
                    stdout_tail: String::new(),
                    stderr_tail: "SyntaxError".into(),
                    phase: ExecutionPhase::SmokeTest,
                    classification_label: "compile_or_parse_error".into(),
                },
            )
            .await
            .unwrap();
        assert_ne!(repaired.code, previous.code);
    }
}
