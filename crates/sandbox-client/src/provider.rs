use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SandboxResult;

/// Result of one `exec` call inside a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// The sandbox's captured value of the final expression, when the
    /// runtime supports expression-value capture (e.g. a notebook-style
    /// kernel). `None` for plain script execution.
    pub structured_result: Option<serde_json::Value>,
}

impl ExecResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Last ~2KB of stderr, the bounded excerpt forwarded to the Code
    /// Generator on repair (spec §4.D).
    pub fn stderr_tail(&self) -> String {
        tail(&self.stderr, 2048)
    }

    pub fn stdout_tail(&self) -> String {
        tail(&self.stdout, 2048)
    }
}

fn tail(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let start = s.len() - max_bytes;
    // avoid splitting a UTF-8 char boundary
    let start = (start..s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(start);
    s[start..].to_string()
}

/// Backend that actually talks to a sandbox provider (HTTP or in-memory
/// mock). Scoped to one already-created sandbox instance.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    async fn exec(&self, sandbox_id: &str, code: &str, timeout: Duration) -> SandboxResult<ExecResult>;
    async fn write_file(&self, sandbox_id: &str, path: &str, bytes: &[u8]) -> SandboxResult<()>;
    async fn read_file(&self, sandbox_id: &str, path: &str) -> SandboxResult<Vec<u8>>;
    async fn kill(&self, sandbox_id: &str) -> SandboxResult<()>;
}

/// Provider-level capability: acquire a fresh sandbox instance.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn create(&self, template_id: &str, lifetime: Duration) -> SandboxResult<Sandbox>;
}

/// Default per-exec and per-sandbox-lifetime timeouts (spec §4.A / §5).
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SANDBOX_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// A single-use, hermetic execution environment for one pipeline's
/// duration. `release()` is idempotent and safe to call from any exit
/// path — Drop best-effort-logs a leak if a caller forgot to release.
pub struct Sandbox {
    id: String,
    backend: Arc<dyn SandboxBackend>,
    tool_endpoint_url: String,
    tool_auth_token: String,
    released: std::sync::atomic::AtomicBool,
}

impl Sandbox {
    pub fn new(
        id: impl Into<String>,
        backend: Arc<dyn SandboxBackend>,
        tool_endpoint_url: impl Into<String>,
        tool_auth_token: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            backend,
            tool_endpoint_url: tool_endpoint_url.into(),
            tool_auth_token: tool_auth_token.into(),
            released: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tool_endpoint_url(&self) -> &str {
        &self.tool_endpoint_url
    }

    /// Bearer token minted by the sandbox provider, scoped to this
    /// sandbox. Never log this value (spec §9).
    pub fn tool_auth_token(&self) -> &str {
        &self.tool_auth_token
    }

    pub async fn exec(&self, code: &str, timeout: Duration) -> SandboxResult<ExecResult> {
        tracing::info!(sandbox_id = %self.id, timeout_secs = timeout.as_secs(), "sandbox exec");
        self.backend.exec(&self.id, code, timeout).await
    }

    pub async fn write_file(&self, path: &str, bytes: &[u8]) -> SandboxResult<()> {
        self.backend.write_file(&self.id, path, bytes).await
    }

    pub async fn read_file(&self, path: &str) -> SandboxResult<Vec<u8>> {
        self.backend.read_file(&self.id, path).await
    }

    /// Idempotent teardown. Must never throw — on repeated calls, or on a
    /// backend error, it logs and returns success so callers can always
    /// safely call this on every exit path.
    pub async fn release(&self) {
        if self
            .released
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            return;
        }
        if let Err(err) = self.backend.kill(&self.id).await {
            tracing::warn!(sandbox_id = %self.id, error = %err, "sandbox release reported an error; treating as released");
        } else {
            tracing::info!(sandbox_id = %self.id, "sandbox released");
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if !self.released.load(std::sync::atomic::Ordering::SeqCst) {
            tracing::warn!(sandbox_id = %self.id, "sandbox dropped without an explicit release() call");
        }
    }
}
