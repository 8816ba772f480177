use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    #[error("LLM provider rate-limited the request: {0}")]
    RateLimited(String),

    #[error("LLM provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("invalid response from LLM provider: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Unavailable(_) | LlmError::RateLimited(_) | LlmError::RequestFailed(_)
        )
    }
}

pub type LlmResult<T> = Result<T, LlmError>;
