use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{SandboxError, SandboxResult};
use crate::provider::{ExecResult, Sandbox, SandboxBackend, SandboxProvider};

/// In-memory sandbox used by tests, exercising the HTTP-shaped client
/// against synthetic data rather than a live server (see
/// `confidence-calibrator`'s unit tests, which fit against generated
/// prediction arrays instead of a live model).
pub struct MockSandboxProvider {
    /// Called on every `exec`; lets a test script a sequence of
    /// results/failures per attempt.
    exec_fn: Arc<dyn Fn(&str, &str) -> SandboxResult<ExecResult> + Send + Sync>,
    fail_create: bool,
    files: Arc<Mutex<std::collections::HashMap<String, Vec<u8>>>>,
}

impl MockSandboxProvider {
    pub fn new<F>(exec_fn: F) -> Self
    where
        F: Fn(&str, &str) -> SandboxResult<ExecResult> + Send + Sync + 'static,
    {
        Self {
            exec_fn: Arc::new(exec_fn),
            fail_create: false,
            files: Arc::new(Mutex::new(std::collections::HashMap::new())),
        }
    }

    pub fn always_unavailable() -> Self {
        let mut provider = Self::new(|_, _| Err(SandboxError::Unavailable("mock: forced outage".into())));
        provider.fail_create = true;
        provider
    }
}

#[async_trait]
impl SandboxProvider for MockSandboxProvider {
    async fn create(&self, _template_id: &str, _lifetime: Duration) -> SandboxResult<Sandbox> {
        if self.fail_create {
            return Err(SandboxError::Unavailable("mock: forced outage".into()));
        }
        let backend: Arc<dyn SandboxBackend> = Arc::new(MockBackend {
            exec_fn: self.exec_fn.clone(),
            files: self.files.clone(),
        });
        Ok(Sandbox::new(
            format!("mock-{}", uuid_like()),
            backend,
            "http://mock-tool-gateway.local",
            "mock-token",
        ))
    }
}

struct MockBackend {
    exec_fn: Arc<dyn Fn(&str, &str) -> SandboxResult<ExecResult> + Send + Sync>,
    files: Arc<Mutex<std::collections::HashMap<String, Vec<u8>>>>,
}

#[async_trait]
impl SandboxBackend for MockBackend {
    async fn exec(&self, sandbox_id: &str, code: &str, _timeout: Duration) -> SandboxResult<ExecResult> {
        (self.exec_fn)(sandbox_id, code)
    }

    async fn write_file(&self, _sandbox_id: &str, path: &str, bytes: &[u8]) -> SandboxResult<()> {
        self.files.lock().await.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_file(&self, _sandbox_id: &str, path: &str) -> SandboxResult<Vec<u8>> {
        self.files
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| SandboxError::Other(format!("no such file: {path}")))
    }

    async fn kill(&self, _sandbox_id: &str) -> SandboxResult<()> {
        Ok(())
    }
}

fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed).to_string()
}
