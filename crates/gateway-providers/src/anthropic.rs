//! Anthropic provider implementation.
//!
//! Uses the Messages API:
//! - Endpoint: `{base}/v1/messages`
//! - `x-api-key` authentication with a pinned `anthropic-version`
//! - System messages travel in the top-level `system` field
//! - Streaming as typed SSE events (`message_start`, `content_block_delta`, ...)

use crate::completion::complete_with;
use crate::config::ProviderConfig;
use crate::http::{next_event, status_error, transport_error};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::{
    cancellable, ChatRequest, ChatResponse, ChunkStream, Completion, CompletionOptions,
    CompletionOverrides, FinishReason, GatewayError, GatewayResult, LLMProvider, MessageRole,
    Usage,
};
use gateway_resilience::RetryPolicy;
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Public Anthropic API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Pinned API version header
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Models advertised when none are configured
pub const DEFAULT_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
];

/// Anthropic provider
pub struct AnthropicProvider {
    config: ProviderConfig,
    client: Client,
    policy: RetryPolicy,
    models: Vec<String>,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    ///
    /// # Errors
    /// Returns error if the HTTP client or rate limiter cannot be created
    pub fn new(config: ProviderConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        let policy = config.retry_policy()?;
        let models = if config.models.is_empty() {
            DEFAULT_MODELS.iter().map(ToString::to_string).collect()
        } else {
            config.models.clone()
        };

        Ok(Self {
            config,
            client,
            policy,
            models,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn transform_request<'a>(
        &self,
        request: &'a ChatRequest,
        stream: bool,
    ) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &request.model,
            max_tokens: request
                .max_tokens
                .unwrap_or(self.config.defaults.max_tokens),
            system: request.system_prompt(),
            messages: request
                .messages
                .iter()
                .filter(|m| m.role() != MessageRole::System)
                .map(|m| AnthropicMessage {
                    role: m.role().as_str(),
                    content: m.content(),
                })
                .collect(),
            temperature: request.temperature,
            stream,
        }
    }

    fn request_builder(&self, body: &AnthropicRequest<'_>) -> reqwest::RequestBuilder {
        self.client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }

    async fn send(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        let body = self.transform_request(request, false);

        debug!(model = %request.model, "Sending request to Anthropic");

        let response = self
            .request_builder(&body)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&self.config.name, &e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Anthropic returned an error");
            return Err(status_error(&self.config.name, status.as_u16(), &text));
        }

        let parsed: AnthropicResponse = response.json().await.map_err(|e| {
            let message = format!("Failed to parse response: {e}");
            GatewayError::provider(&self.config.name, message, None, false)
        })?;

        Ok(parsed.into_chat_response())
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    fn defaults(&self) -> &CompletionOptions {
        &self.config.defaults
    }

    fn initialize(&self) -> GatewayResult<()> {
        self.config.validate()
    }

    async fn complete(
        &self,
        ctx: &CancellationToken,
        prompt: &str,
        overrides: &CompletionOverrides,
    ) -> GatewayResult<Completion> {
        complete_with(
            &self.config.name,
            ctx,
            &self.policy,
            &self.config.defaults,
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
        let request = request.clone().with_defaults(&self.config.defaults);
        request.validate()?;

        self.policy.execute(ctx, || self.send(&request)).await
    }

    async fn chat_stream(
        &self,
        ctx: &CancellationToken,
        request: &ChatRequest,
    ) -> GatewayResult<ChunkStream> {
        let request = request.clone().with_defaults(&self.config.defaults);
        request.validate()?;
        self.policy.acquire(ctx).await?;

        debug!(model = %request.model, "Starting streaming request to Anthropic");

        let body = self.transform_request(&request, true);
        let event_source = EventSource::new(self.request_builder(&body)).map_err(|e| {
            let message = format!("Failed to create event source: {e}");
            GatewayError::provider(&self.config.name, message, None, true)
        })?;

        let provider = self.config.name.clone();
        let requested_model = request.model.clone();
        let idle = self.config.timeout;

        let stream = try_stream! {
            let mut es = event_source;
            let mut id = String::new();
            let mut model = requested_model;
            let created = chrono::Utc::now().timestamp();
            let mut stop_reason: Option<String> = None;
            let mut finished = false;

            while let Some(event) = next_event(&mut es, idle).await? {
                match event {
                    Ok(Event::Open) => {
                        trace!("Anthropic stream opened");
                    }
                    Ok(Event::Message(msg)) => {
                        let event = match serde_json::from_str::<StreamEvent>(&msg.data) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!(
                                    error = %e,
                                    event = %msg.event,
                                    "Failed to parse Anthropic event"
                                );
                                continue;
                            }
                        };

                        match event {
                            StreamEvent::MessageStart { message } => {
                                id = message.id;
                                model = message.model;
                            }
                            StreamEvent::ContentBlockDelta { delta } => {
                                if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                                    yield ChatResponse::chunk(
                                        id.clone(),
                                        model.clone(),
                                        created,
                                        text,
                                        FinishReason::Unset,
                                    );
                                }
                            }
                            StreamEvent::MessageDelta { delta } => {
                                if delta.stop_reason.is_some() {
                                    stop_reason = delta.stop_reason;
                                }
                            }
                            StreamEvent::MessageStop => {
                                finished = true;
                                es.close();
                                break;
                            }
                            StreamEvent::Error { error } => {
                                es.close();
                                Err(GatewayError::streaming(error.message))?;
                            }
                            StreamEvent::Other => {}
                        }
                    }
                    Err(EventSourceError::StreamEnded) => break,
                    Err(EventSourceError::InvalidStatusCode(status, response)) => {
                        es.close();
                        let text = response.text().await.unwrap_or_default();
                        Err(status_error(&provider, status.as_u16(), &text))?;
                    }
                    Err(e) => {
                        es.close();
                        error!(error = %e, "Anthropic stream error");
                        Err(GatewayError::streaming(format!("Stream error: {e}")))?;
                    }
                }
            }

            if !finished {
                warn!("Anthropic stream ended without message_stop");
                Err(GatewayError::streaming("stream ended before message_stop"))?;
            }

            let finish = FinishReason::from_backend(stop_reason.as_deref().or(Some("stop")));
            yield ChatResponse::chunk(id, model, created, "", finish);
        };

        Ok(cancellable(ctx.clone(), stream.boxed()))
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

impl AnthropicResponse {
    fn into_chat_response(self) -> ChatResponse {
        let text: String = self
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text)
            .collect();

        ChatResponse::completion(
            self.id,
            self.model,
            text,
            FinishReason::from_backend(self.stop_reason.as_deref().or(Some("stop"))),
            self.usage
                .map(|u| Usage::new(u.input_tokens, u.output_tokens)),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart { message: StreamMessage },
    ContentBlockDelta { delta: TextDelta },
    MessageDelta { delta: MessageDeltaBody },
    MessageStop,
    Error { error: StreamErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}
