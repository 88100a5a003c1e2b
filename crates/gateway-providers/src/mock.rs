//! Deterministic in-process backend.
//!
//! Answers with fixed content and streams it word by word. Failures, latency
//! and mid-stream errors can be scripted for tests and local development.

use crate::completion::complete_with;
use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::{
    cancellable, ChatRequest, ChatResponse, ChunkStream, Completion, CompletionOptions,
    CompletionOverrides, FinishReason, GatewayError, GatewayResult, LLMProvider, Usage,
};
use gateway_resilience::{RetryPolicy, RetryPolicyBuilder};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Content returned when none is configured
pub const DEFAULT_CONTENT: &str = "Hello! I am a mock response.";

/// Response id prefix
pub const MOCK_RESPONSE_ID: &str = "mock-response-id";

/// Kind of scripted failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Retryable backend failure (HTTP 503)
    Transient,
    /// Backend rejected the request
    Validation,
}

impl MockFailure {
    fn to_error(self, provider: &str) -> GatewayError {
        match self {
            Self::Transient => {
                GatewayError::provider(provider, "mock transient failure", Some(503), true)
            }
            Self::Validation => GatewayError::validation("mock rejected request", None, "mock"),
        }
    }
}

/// Mock backend adapter
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    defaults: CompletionOptions,
    content: String,
    latency: Duration,
    chunk_delay: Duration,
    failures: AtomicU32,
    failure: MockFailure,
    stream_failure_after: Option<usize>,
    policy: RetryPolicy,
    calls: AtomicU32,
}

impl MockProvider {
    /// Create a mock that always succeeds
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: vec!["mock".to_string()],
            defaults: CompletionOptions::new("mock"),
            content: DEFAULT_CONTENT.to_string(),
            latency: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            failures: AtomicU32::new(0),
            failure: MockFailure::Transient,
            stream_failure_after: None,
            policy: RetryPolicyBuilder::new()
                .backoff_unit(Duration::from_millis(10))
                .build(),
            calls: AtomicU32::new(0),
        }
    }

    /// Set the response content
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Delay every backend call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay between stream chunks
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Fail the next `count` backend calls
    #[must_use]
    pub fn with_failures(mut self, count: u32, failure: MockFailure) -> Self {
        self.failures = AtomicU32::new(count);
        self.failure = failure;
        self
    }

    /// Emit a streaming error after `chunks` chunks
    #[must_use]
    pub fn with_stream_failure_after(mut self, chunks: usize) -> Self {
        self.stream_failure_after = Some(chunks);
        self
    }

    /// Set the default retry budget and backoff unit
    #[must_use]
    pub fn with_retry_policy(mut self, max_attempts: u32, backoff_unit: Duration) -> Self {
        self.defaults.max_attempts = max_attempts;
        self.policy = RetryPolicyBuilder::new()
            .max_attempts(max_attempts)
            .backoff_unit(backoff_unit)
            .build();
        self
    }

    /// Backend calls performed so far
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| self.failure.to_error(&self.name))
    }

    async fn send(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        Ok(ChatResponse::completion(
            MOCK_RESPONSE_ID,
            request.model.clone(),
            self.content.clone(),
            FinishReason::Stop,
            Some(Usage::new(10, 10)),
        ))
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    fn defaults(&self) -> &CompletionOptions {
        &self.defaults
    }

    fn initialize(&self) -> GatewayResult<()> {
        self.defaults.validate_config()
    }

    async fn complete(
        &self,
        ctx: &CancellationToken,
        prompt: &str,
        overrides: &CompletionOverrides,
    ) -> GatewayResult<Completion> {
        complete_with(
            &self.name,
            ctx,
            &self.policy,
            &self.defaults,
            prompt,
            overrides,
            |request| async move { self.send(&request).await },
        )
        .await
    }

    async fn chat(
        &self,
        ctx: &CancellationToken,
        request: &ChatRequest,
    ) -> GatewayResult<ChatResponse> {
        let request = request.clone().with_defaults(&self.defaults);
        request.validate()?;

        self.policy.execute(ctx, || self.send(&request)).await
    }

    async fn chat_stream(
        &self,
        ctx: &CancellationToken,
        request: &ChatRequest,
    ) -> GatewayResult<ChunkStream> {
        let request = request.clone().with_defaults(&self.defaults);
        request.validate()?;
        self.policy.acquire(ctx).await?;

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let words: Vec<String> = self.content.split(' ').map(|w| format!("{w} ")).collect();
        let last = words.len().saturating_sub(1);
        let model = request.model;
        let created = chrono::Utc::now().timestamp();
        let delay = self.chunk_delay;
        let fail_after = self.stream_failure_after;

        debug!(provider = %self.name, chunks = words.len(), "Starting mock stream");

        let stream = async_stream::stream! {
            for (i, word) in words.into_iter().enumerate() {
                if fail_after == Some(i) {
                    yield Err(GatewayError::streaming("mock stream failure"));
                    return;
                }
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let finish = if i == last { FinishReason::Stop } else { FinishReason::Unset };
                yield Ok(ChatResponse::chunk(
                    format!("{MOCK_RESPONSE_ID}-{i}"),
                    model.clone(),
                    created,
                    word,
                    finish,
                ));
            }
        };

        Ok(cancellable(ctx.clone(), stream.boxed()))
    }
}
