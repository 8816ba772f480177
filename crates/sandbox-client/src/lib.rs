//! Sandbox Substrate: acquire/release an isolated execution environment
//! with a research-tool capability, execute code snippets, and expose a
//! file interface (spec §4.A).

pub mod error;
pub mod http;
pub mod mock;
pub mod provider;

pub use error::{SandboxError, SandboxResult};
pub use http::HttpSandboxProvider;
pub use mock::MockSandboxProvider;
pub use provider::{
    ExecResult, Sandbox, SandboxBackend, SandboxProvider, DEFAULT_EXEC_TIMEOUT,
    DEFAULT_SANDBOX_LIFETIME,
};
