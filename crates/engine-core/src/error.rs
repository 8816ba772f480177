use thiserror::Error;

/// Error taxonomy shared across the pipeline (spec §7). Recoverable kinds
/// (ProviderUnavailable, GenerationInvalid, ExecutionFailure,
/// CalibrationRejection, PartialMonteCarlo) are handled locally by the
/// repair loop or the Monte Carlo driver; only `TaskFailure` is meant to
/// escape a pipeline, and only `BatchFailure` escapes the scheduler.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{provider} provider unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("{provider} provider rejected credentials: {reason}")]
    ProviderUnauthorized { provider: String, reason: String },

    #[error("generated code is invalid: {0}")]
    GenerationInvalid(String),

    #[error("execution failed: {0}")]
    ExecutionFailure(String),

    #[error("calibration rejected: {0}")]
    CalibrationRejection(String),

    #[error("calibration batch too small: need at least 5 trials, got {0}")]
    CalibrationTooSmall(usize),

    #[error("{failed}/{total} Monte Carlo trials failed (> 10%)")]
    PartialMonteCarlo { failed: usize, total: usize },

    #[error("task {slug} failed: {cause}")]
    TaskFailure { slug: String, cause: String },

    #[error("batch could not start: {0}")]
    BatchFailure(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
