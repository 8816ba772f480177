use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SandboxError, SandboxResult};
use crate::provider::{ExecResult, Sandbox, SandboxBackend, SandboxProvider};

#[derive(Serialize)]
struct CreateRequest<'a> {
    template_id: &'a str,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct CreateResponse {
    sandbox_id: String,
    tool_endpoint_url: String,
    tool_auth_token: String,
}

#[derive(Serialize)]
struct ExecRequest<'a> {
    code: &'a str,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct ExecResponse {
    exit_code: i32,
    stdout: String,
    stderr: String,
    structured_result: Option<serde_json::Value>,
}

/// HTTP-backed sandbox provider, matching the reqwest-client-with-a-timeout
/// construction in `ml-client::signal_models::SignalModelsClient::new`.
#[derive(Clone)]
pub struct HttpSandboxProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSandboxProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SandboxProvider for HttpSandboxProvider {
    async fn create(&self, template_id: &str, lifetime: Duration) -> SandboxResult<Sandbox> {
        let url = format!("{}/sandboxes", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CreateRequest {
                template_id,
                timeout_secs: lifetime.as_secs(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    SandboxError::Unavailable(e.to_string())
                } else {
                    SandboxError::RequestFailed(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(SandboxError::Unavailable(format!(
                "sandbox create returned HTTP {}",
                response.status()
            )));
        }

        let body: CreateResponse = response
            .json()
            .await
            .map_err(|e| SandboxError::InvalidResponse(e.to_string()))?;

        let backend: Arc<dyn SandboxBackend> = Arc::new(self.clone());
        Ok(Sandbox::new(
            body.sandbox_id,
            backend,
            body.tool_endpoint_url,
            body.tool_auth_token,
        ))
    }
}

#[async_trait]
impl SandboxBackend for HttpSandboxProvider {
    async fn exec(&self, sandbox_id: &str, code: &str, timeout: Duration) -> SandboxResult<ExecResult> {
        let url = format!("{}/sandboxes/{}/exec", self.base_url, sandbox_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&ExecRequest {
                code,
                timeout_secs: timeout.as_secs(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SandboxError::Timeout(timeout)
                } else {
                    SandboxError::RequestFailed(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(SandboxError::InvalidResponse(format!(
                "exec returned HTTP {}",
                response.status()
            )));
        }

        let body: ExecResponse = response
            .json()
            .await
            .map_err(|e| SandboxError::InvalidResponse(e.to_string()))?;

        Ok(ExecResult {
            exit_code: body.exit_code,
            stdout: body.stdout,
            stderr: body.stderr,
            structured_result: body.structured_result,
        })
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, bytes: &[u8]) -> SandboxResult<()> {
        let url = format!("{}/sandboxes/{}/files", self.base_url, sandbox_id);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_key)
            .query(&[("path", path)])
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(SandboxError::RequestFailed)?;

        if !response.status().is_success() {
            return Err(SandboxError::InvalidResponse(format!(
                "write_file returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> SandboxResult<Vec<u8>> {
        let url = format!("{}/sandboxes/{}/files", self.base_url, sandbox_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(SandboxError::RequestFailed)?;

        if !response.status().is_success() {
            return Err(SandboxError::InvalidResponse(format!(
                "read_file returned HTTP {}",
                response.status()
            )));
        }
        Ok(response.bytes().await.map_err(SandboxError::RequestFailed)?.to_vec())
    }

    async fn kill(&self, sandbox_id: &str) -> SandboxResult<()> {
        let url = format!("{}/sandboxes/{}", self.base_url, sandbox_id);
        // Best effort: a failed DELETE does not propagate as a release()
        // failure (release() must never throw, per spec §4.A).
        match self.client.delete(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(sandbox_id, status = %response.status(), "sandbox kill returned non-success");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(sandbox_id, error = %e, "sandbox kill request failed");
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }
}
