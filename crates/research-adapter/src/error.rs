use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("research tool unavailable: {0}")]
    Unavailable(String),

    #[error("research tool rejected the request (not authorized): {0}")]
    Unauthorized(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("invalid response from research tool: {0}")]
    InvalidResponse(String),
}

impl ResearchError {
    /// Transport errors are retried; authorization errors are not (spec
    /// §4.B).
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ResearchError::Unauthorized(_))
    }
}

pub type ResearchResult<T> = Result<T, ResearchError>;
