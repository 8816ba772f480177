use engine_core::execution_log::ExecutionPhase;
use engine_core::{EngineError, ResearchBundle, SimulationArtifact};

use crate::error::LlmError;
use crate::prompts;
use crate::provider::LlmProvider;

const MAX_PROVIDER_RETRIES: u32 = 2;

/// Diagnostics from a failed execution attempt, fed back into `repair`.
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub exit_code: i32,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub phase: ExecutionPhase,
    pub classification_label: String,
}

/// Authors and repairs `SimulationArtifact`s (spec §4.C). Generic over the
/// provider so tests can substitute a scripted `LlmProvider`.
pub struct CodeGenerator<P: LlmProvider> {
    provider: P,
    model_id: String,
}

impl<P: LlmProvider> CodeGenerator<P> {
    pub fn new(provider: P, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    async fn complete_with_retry(&self, user_prompt: &str) -> Result<String, EngineError> {
        let system_prompt = prompts::system_prompt();
        let mut last_err: Option<LlmError> = None;

        for attempt in 0..=MAX_PROVIDER_RETRIES {
            match self
                .provider
                .complete(&system_prompt, user_prompt, &self.model_id)
                .await
            {
                Ok(text) => return Ok(text),
                Err(LlmError::Unauthorized(reason)) => {
                    tracing::warn!(reason = %reason, "LLM provider rejected credentials, not retrying");
                    return Err(EngineError::ProviderUnauthorized {
                        provider: "llm".into(),
                        reason,
                    });
                }
                Err(err) if err.is_retryable() && attempt < MAX_PROVIDER_RETRIES => {
                    tracing::warn!(attempt, error = %err, "LLM call failed, retrying");
                    last_err = Some(err);
                }
                Err(err) => {
                    last_err = Some(err);
                    break;
                }
            }
        }

        Err(EngineError::ProviderUnavailable {
            provider: "llm".into(),
            reason: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Author an initial artifact from a question and research bundle.
    pub async fn initial(
        &self,
        question: &str,
        research: &ResearchBundle,
    ) -> Result<SimulationArtifact, EngineError> {
        let user_prompt = prompts::initial_user_prompt(question, &research.to_text());
        let code = self.complete_with_retry(&user_prompt).await?;
        Ok(SimulationArtifact::generated_with_description(code))
    }

    /// Produce a repaired artifact given the prior artifact and a
    /// classified failure.
    pub async fn repair(
        &self,
        previous: &SimulationArtifact,
        failure: &FailureContext,
    ) -> Result<SimulationArtifact, EngineError> {
        let user_prompt = prompts::repair_user_prompt(
            &previous.code,
            &failure.classification_label,
            &failure.stdout_tail,
            &failure.stderr_tail,
        );
        let code = self.complete_with_retry(&user_prompt).await?;
        Ok(SimulationArtifact::generated_with_description(code))
    }

    /// One re-generation attempt requested by the Calibration Pass when
    /// the model is degenerate/low-variance (spec §4.E).
    pub async fn regenerate_for_stochasticity(
        &self,
        previous: &SimulationArtifact,
    ) -> Result<SimulationArtifact, EngineError> {
        let user_prompt = prompts::insufficient_stochasticity_prompt(&previous.code);
        let code = self.complete_with_retry(&user_prompt).await?;
        Ok(SimulationArtifact::generated_with_description(code))
    }
}
