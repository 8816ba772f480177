use std::time::Duration;

use async_trait::async_trait;
use engine_core::ResearchBundle;
use sandbox_client::Sandbox;
use serde::Deserialize;

use crate::error::{ResearchError, ResearchResult};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
struct ToolResponse {
    context: String,
    #[serde(default)]
    highlights: Vec<String>,
    #[serde(default)]
    snippets: Vec<String>,
}

/// Backend that actually invokes the research tool through a sandbox's
/// tool gateway. Split out from `ResearchAdapter` so tests can supply a
/// scripted implementation without a live HTTP endpoint.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    async fn call(&self, tool_endpoint_url: &str, tool_auth_token: &str, question: &str)
        -> ResearchResult<ResearchBundle>;
}

/// Production backend: a single POST to the sandbox-minted tool gateway.
pub struct HttpResearchBackend {
    client: reqwest::Client,
}

impl Default for HttpResearchBackend {
    fn default() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl ResearchBackend for HttpResearchBackend {
    async fn call(
        &self,
        tool_endpoint_url: &str,
        tool_auth_token: &str,
        question: &str,
    ) -> ResearchResult<ResearchBundle> {
        let response = self
            .client
            .post(tool_endpoint_url)
            .bearer_auth(tool_auth_token)
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ResearchError::Unavailable(e.to_string())
                } else {
                    ResearchError::RequestFailed(e)
                }
            })?;

        match response.status().as_u16() {
            401 | 403 => Err(ResearchError::Unauthorized(format!(
                "research tool returned HTTP {}",
                response.status()
            ))),
            s if (200..300).contains(&s) => {
                let body: ToolResponse = response
                    .json()
                    .await
                    .map_err(|e| ResearchError::InvalidResponse(e.to_string()))?;
                Ok(ResearchBundle {
                    context: body.context,
                    highlights: body.highlights,
                    snippets: body.snippets,
                })
            }
            s => Err(ResearchError::Unavailable(format!("research tool returned HTTP {s}"))),
        }
    }
}

/// Translates a free-form question into a `ResearchBundle` by invoking the
/// research tool through the sandbox's tool gateway (spec §4.B), with
/// bounded exponential-backoff retry on transport errors, mirroring
/// `polygon-client::PolygonClient::send_request`'s retry loop.
pub struct ResearchAdapter<B: ResearchBackend = HttpResearchBackend> {
    backend: B,
}

impl ResearchAdapter<HttpResearchBackend> {
    pub fn new() -> Self {
        Self {
            backend: HttpResearchBackend::default(),
        }
    }
}

impl Default for ResearchAdapter<HttpResearchBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ResearchBackend> ResearchAdapter<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Gathers grounded context for `question` via `sandbox`. On an
    /// unavailable research tool the pipeline continues with an empty
    /// bundle rather than failing — grounding is helpful, not required.
    pub async fn research(&self, sandbox: &Sandbox, question: &str) -> ResearchBundle {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .backend
                .call(sandbox.tool_endpoint_url(), sandbox.tool_auth_token(), question)
                .await
            {
                Ok(bundle) => return bundle,
                Err(err) if !err.is_retryable() => {
                    tracing::warn!(error = %err, "research tool call not authorized; continuing with empty bundle");
                    return ResearchBundle::empty();
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %err,
                        "research tool call failed, retrying"
                    );
                    last_err = Some(err);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        tracing::warn!(
            error = ?last_err,
            "research tool exhausted retries; continuing with empty bundle"
        );
        ResearchBundle::empty()
    }
}
