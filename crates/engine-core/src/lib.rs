//! Shared data model, error taxonomy, and configuration for the simulation
//! orchestration engine.

pub mod artifact;
pub mod batch;
pub mod calibration;
pub mod config;
pub mod error;
pub mod execution_log;
pub mod market;
pub mod montecarlo;
pub mod pipeline;
pub mod research;
pub mod signal;
pub mod trial;

pub use artifact::{ArtifactDescription, SimulationArtifact};
pub use batch::{BatchEntry, BatchOutcome, BatchReport, FailureKind, FailureRecord};
pub use calibration::{Calibration, CalibrationVerdict};
pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use execution_log::{DiagnosticClassification, ExecutionLogEntry, ExecutionPhase};
pub use market::{slugify_question, MarketDescriptor};
pub use montecarlo::{MonteCarloMode, MonteCarloResult};
pub use pipeline::{Explanation, PipelineResult, PipelineStatus};
pub use research::ResearchBundle;
pub use signal::{Signal, DEFAULT_SIGNAL_EPSILON};
pub use trial::TrialOutcome;
