//! Shared single-shot completion flow for the adapters.

use gateway_core::{
    ChatRequest, ChatResponse, Completion, CompletionOptions, CompletionOverrides, GatewayError,
    GatewayResult,
};
use gateway_resilience::RetryPolicy;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolve options, validate, then run `send` under the retry policy.
///
/// Nothing reaches `send` for an empty prompt or invalid options.
pub(crate) async fn complete_with<F, Fut>(
    provider: &str,
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    defaults: &CompletionOptions,
    prompt: &str,
    overrides: &CompletionOverrides,
    send: F,
) -> GatewayResult<Completion>
where
    F: Fn(ChatRequest) -> Fut,
    Fut: Future<Output = GatewayResult<ChatResponse>>,
{
    if prompt.is_empty() {
        return Err(GatewayError::EmptyPrompt);
    }

    let options = defaults.apply(overrides);
    options.validate()?;

    debug!(
        provider,
        model = %options.model,
        max_attempts = options.max_attempts,
        "Dispatching completion"
    );

    let request = ChatRequest::from_prompt(&options, prompt);
    let response = policy
        .execute_with_attempts(ctx, options.max_attempts, || send(request.clone()))
        .await?;

    Completion::from_response(provider, response)
}
