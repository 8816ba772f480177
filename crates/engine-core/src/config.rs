/// Engine-wide configuration, read from the environment (spec §6). Market
/// source credentials (`MARKET_*`) are intentionally not modeled here —
/// they're opaque to this engine and belong to the out-of-scope market
/// source collaborator.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model_id: String,
    pub sandbox_api_key: String,
    pub sandbox_base_url: String,
    pub sandbox_template_id: String,
    pub research_api_key: String,
    pub batch_concurrency: usize,
    pub monte_carlo_runs: usize,
    pub calibration_runs: usize,
    pub max_repair_retries: u32,
    pub signal_epsilon: f64,
}

impl Config {
    /// Load `.env` (if present) then read every variable named in spec §6.
    /// Only the credential fields are required; everything else falls back
    /// to its documented default.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let llm_api_key = require_env("LLM_API_KEY")?;
        let sandbox_api_key = require_env("SANDBOX_API_KEY")?;
        let research_api_key = require_env("RESEARCH_API_KEY")?;

        Ok(Self {
            llm_api_key,
            llm_base_url: env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_model_id: env_or("LLM_MODEL_ID", "gpt-4o"),
            sandbox_api_key,
            sandbox_base_url: env_or("SANDBOX_BASE_URL", "https://api.e2b.dev"),
            sandbox_template_id: env_or("SANDBOX_TEMPLATE_ID", "default"),
            research_api_key,
            batch_concurrency: env_parsed_or("BATCH_CONCURRENCY", 10),
            monte_carlo_runs: env_parsed_or("MONTE_CARLO_RUNS", 200),
            calibration_runs: env_parsed_or("CALIBRATION_RUNS", 50),
            max_repair_retries: env_parsed_or("MAX_REPAIR_RETRIES", 5),
            signal_epsilon: env_parsed_or("SIGNAL_EPSILON", 0.05),
        })
    }
}

fn require_env(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("missing required environment variable {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| {
            tracing::debug!(key, "using default value for unset/unparseable env var");
            default
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_key_errors() {
        std::env::remove_var("LLM_API_KEY_TEST_PROBE");
        assert!(require_env("LLM_API_KEY_TEST_PROBE").is_err());
    }

    #[test]
    fn env_parsed_or_falls_back_on_bad_value() {
        std::env::set_var("ENGINE_CORE_TEST_BAD_INT", "not-a-number");
        let value: usize = env_parsed_or("ENGINE_CORE_TEST_BAD_INT", 42);
        assert_eq!(value, 42);
        std::env::remove_var("ENGINE_CORE_TEST_BAD_INT");
    }
}
