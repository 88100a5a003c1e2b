//! Backend adapter trait.
//!
//! Every external LLM service is wrapped in an adapter implementing
//! [`LLMProvider`]. The registry stores adapters as `Arc<dyn LLMProvider>`
//! and shares them read-only across concurrent requests.

use crate::error::{GatewayError, GatewayResult};
use crate::options::{CompletionOptions, CompletionOverrides};
use crate::request::ChatRequest;
use crate::response::{ChatResponse, Completion};
use crate::streaming::{ChunkStream, CompletionStream};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Capability set every backend adapter exposes
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Unique provider name (registry key)
    fn name(&self) -> &str;

    /// Models this backend can serve
    fn models(&self) -> &[String];

    /// Provider-level default options
    fn defaults(&self) -> &CompletionOptions;

    /// Validate static configuration before any network use.
    ///
    /// Idempotent; intended to be called once at startup.
    ///
    /// # Errors
    /// Returns a configuration error when credentials or defaults are invalid
    fn initialize(&self) -> GatewayResult<()>;

    /// Single-shot completion of `prompt`, wrapped by the retry policy.
    ///
    /// An empty prompt fails with [`GatewayError::EmptyPrompt`] before any
    /// network call.
    ///
    /// # Errors
    /// Returns the classified backend error, or `AllAttemptsFailed` once the
    /// retry budget is exhausted
    async fn complete(
        &self,
        ctx: &CancellationToken,
        prompt: &str,
        overrides: &CompletionOverrides,
    ) -> GatewayResult<Completion>;

    /// Chat completion of a canonical request
    ///
    /// # Errors
    /// Returns the classified backend error
    async fn chat(&self, ctx: &CancellationToken, request: &ChatRequest)
        -> GatewayResult<ChatResponse>;

    /// Streaming chat completion of a canonical request.
    ///
    /// The stream is finite and non-restartable; its last item carries a
    /// non-empty finish reason unless the backend fails mid-stream.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be opened
    async fn chat_stream(
        &self,
        ctx: &CancellationToken,
        request: &ChatRequest,
    ) -> GatewayResult<ChunkStream>;

    /// Streaming completion of `prompt` with the provider defaults
    ///
    /// # Errors
    /// Returns [`GatewayError::EmptyPrompt`] for an empty prompt, or the error
    /// raised while opening the stream
    async fn stream_complete(
        &self,
        ctx: &CancellationToken,
        prompt: &str,
    ) -> GatewayResult<CompletionStream> {
        if prompt.is_empty() {
            return Err(GatewayError::EmptyPrompt);
        }

        let mut request = ChatRequest::from_prompt(self.defaults(), prompt);
        request.stream = true;

        let provider = self.name().to_string();
        let chunks = self.chat_stream(ctx, &request).await?;

        Ok(chunks
            .map(move |chunk| chunk.and_then(|c| Completion::from_response(&provider, c)))
            .boxed())
    }
}
