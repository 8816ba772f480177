//! Research Adapter: turns a market question into grounded context by
//! invoking the research tool exposed through a sandbox's tool gateway
//! (spec §4.B).

pub mod adapter;
pub mod error;

pub use adapter::{HttpResearchBackend, ResearchAdapter, ResearchBackend};
pub use error::{ResearchError, ResearchResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::ResearchBundle;
    use sandbox_client::{ExecResult, MockSandboxProvider, SandboxProvider, DEFAULT_SANDBOX_LIFETIME};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyThenSucceedsBackend {
        calls: Arc<AtomicU32>,
        fail_until: u32,
    }

    #[async_trait]
    impl ResearchBackend for FlakyThenSucceedsBackend {
        async fn call(
            &self,
            _tool_endpoint_url: &str,
            _tool_auth_token: &str,
            question: &str,
        ) -> crate::error::ResearchResult<ResearchBundle> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_until {
                return Err(crate::error::ResearchError::Unavailable("flaky".into()));
            }
            Ok(ResearchBundle {
                context: format!("research for: {question}"),
                highlights: vec![],
                snippets: vec![],
            })
        }
    }

    struct AlwaysUnauthorizedBackend;

    #[async_trait]
    impl ResearchBackend for AlwaysUnauthorizedBackend {
        async fn call(
            &self,
            _tool_endpoint_url: &str,
            _tool_auth_token: &str,
            _question: &str,
        ) -> crate::error::ResearchResult<ResearchBundle> {
            Err(crate::error::ResearchError::Unauthorized("bad token".into()))
        }
    }

    async fn mock_sandbox() -> sandbox_client::Sandbox {
        let provider = MockSandboxProvider::new(|_, _| {
            Ok(ExecResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                structured_result: None,
            })
        });
        provider.create("t", DEFAULT_SANDBOX_LIFETIME).await.unwrap()
    }

    #[tokio::test]
    async fn retries_then_succeeds_within_budget() {
        let sandbox = mock_sandbox().await;
        let calls = Arc::new(AtomicU32::new(0));
        let adapter = ResearchAdapter::with_backend(FlakyThenSucceedsBackend {
            calls: calls.clone(),
            fail_until: 2,
        });

        let bundle = adapter.research(&sandbox, "Will the Fed cut rates?").await;
        assert!(!bundle.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unauthorized_short_circuits_to_empty_bundle() {
        let sandbox = mock_sandbox().await;
        let adapter = ResearchAdapter::with_backend(AlwaysUnauthorizedBackend);
        let bundle = adapter.research(&sandbox, "Will the Fed cut rates?").await;
        assert!(bundle.is_empty());
    }
}
