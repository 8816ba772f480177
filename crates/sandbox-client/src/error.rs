use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("sandbox provider unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("sandbox execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid response from sandbox provider: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl SandboxError {
    /// Transient failures are safe to retry at the scheduler level;
    /// anything else (malformed payloads, programming errors) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SandboxError::Unavailable(_) | SandboxError::RequestFailed(_) | SandboxError::Timeout(_)
        )
    }
}

pub type SandboxResult<T> = Result<T, SandboxError>;
