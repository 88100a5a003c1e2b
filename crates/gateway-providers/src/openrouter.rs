//! OpenRouter provider implementation.
//!
//! OpenRouter speaks the OpenAI chat completions dialect:
//! - Endpoint: `{base}/chat/completions`
//! - Bearer authentication, plus `HTTP-Referer` / `X-Title` attribution headers
//! - Streaming as `data:` SSE frames terminated by `[DONE]`

use crate::completion::complete_with;
use crate::config::ProviderConfig;
use crate::http::{next_event, status_error, transport_error};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::{
    cancellable, ChatRequest, ChatResponse, ChunkStream, Completion, CompletionOptions,
    CompletionOverrides, FinishReason, GatewayError, GatewayResult, LLMProvider, Usage,
};
use gateway_resilience::RetryPolicy;
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Public OpenRouter API base URL
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

/// Default attribution referer
pub const DEFAULT_REFERER: &str = "https://github.com/chat-gateway";

/// Default attribution title
pub const DEFAULT_TITLE: &str = "chat-gateway";

/// Models advertised when none are configured
pub const DEFAULT_MODELS: &[&str] = &[
    "openai/gpt-4",
    "openai/gpt-3.5-turbo",
    "anthropic/claude-2",
    "google/gemini-pro",
];

/// OpenRouter provider
pub struct OpenRouterProvider {
    config: ProviderConfig,
    client: Client,
    policy: RetryPolicy,
    models: Vec<String>,
    referer: String,
    title: String,
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider
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
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        })
    }

    /// Override the attribution headers
    #[must_use]
    pub fn with_attribution(
        mut self,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn transform_request<'a>(
        &self,
        request: &'a ChatRequest,
        stream: bool,
    ) -> OpenRouterRequest<'a> {
        OpenRouterRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| OpenRouterMessage {
                    role: m.role().as_str(),
                    content: m.content(),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        }
    }

    fn request_builder(&self, body: &OpenRouterRequest<'_>) -> reqwest::RequestBuilder {
        self.client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
    }

    /// One HTTP round trip, no retries
    async fn send(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        let body = self.transform_request(request, false);

        debug!(model = %request.model, "Sending request to OpenRouter");

        let response = self
            .request_builder(&body)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&self.config.name, &e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "OpenRouter returned an error");
            return Err(status_error(&self.config.name, status.as_u16(), &text));
        }

        let parsed: OpenRouterResponse = response.json().await.map_err(|e| {
            let message = format!("Failed to parse response: {e}");
            GatewayError::provider(&self.config.name, message, None, false)
        })?;

        Ok(parsed.into_chat_response(&request.model))
    }
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
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

        debug!(model = %request.model, "Starting streaming request to OpenRouter");

        let body = self.transform_request(&request, true);
        let event_source = EventSource::new(self.request_builder(&body)).map_err(|e| {
            let message = format!("Failed to create event source: {e}");
            GatewayError::provider(&self.config.name, message, None, true)
        })?;

        let provider = self.config.name.clone();
        let model = request.model.clone();
        let idle = self.config.timeout;

        let stream = try_stream! {
            let mut es = event_source;
            let mut last_id = String::new();
            let mut created = chrono::Utc::now().timestamp();
            let mut finished = false;
            let mut done = false;

            while let Some(event) = next_event(&mut es, idle).await? {
                match event {
                    Ok(Event::Open) => {
                        trace!("OpenRouter stream opened");
                    }
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();
                        if data == "[DONE]" {
                            done = true;
                            es.close();
                            break;
                        }

                        let chunk = match serde_json::from_str::<OpenRouterChunk>(data) {
                            Ok(chunk) => chunk,
                            Err(e) => {
                                warn!(error = %e, data = %data, "Failed to parse OpenRouter chunk");
                                continue;
                            }
                        };

                        last_id.clone_from(&chunk.id);
                        created = chunk.created;

                        if let Some(choice) = chunk.choices.into_iter().next() {
                            let finish =
                                FinishReason::from_backend(choice.finish_reason.as_deref());
                            finished |= finish != FinishReason::Unset;
                            yield ChatResponse::chunk(
                                chunk.id,
                                if chunk.model.is_empty() { model.clone() } else { chunk.model },
                                created,
                                choice.delta.content.unwrap_or_default(),
                                finish,
                            );
                            if finished {
                                es.close();
                                break;
                            }
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
                        error!(error = %e, "OpenRouter stream error");
                        Err(GatewayError::streaming(format!("Stream error: {e}")))?;
                    }
                }
            }

            if !finished {
                if !done {
                    warn!("OpenRouter stream ended before [DONE]");
                    Err(GatewayError::streaming("stream ended before [DONE]"))?;
                }
                yield ChatResponse::chunk(last_id, model.clone(), created, "", FinishReason::Stop);
            }
        };

        Ok(cancellable(ctx.clone(), stream.boxed()))
    }
}

// ============================================================================
// OpenRouter API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: Vec<OpenRouterMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenRouterMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    id: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    model: String,
    choices: Vec<OpenRouterChoice>,
    usage: Option<OpenRouterUsage>,
}

impl OpenRouterResponse {
    fn into_chat_response(self, requested_model: &str) -> ChatResponse {
        let model = if self.model.is_empty() {
            requested_model.to_string()
        } else {
            self.model
        };
        let (content, finish) = self
            .choices
            .into_iter()
            .next()
            .map(|c| (c.message.content.unwrap_or_default(), c.finish_reason))
            .unwrap_or_default();

        let mut response = ChatResponse::completion(
            self.id,
            model,
            content,
            FinishReason::from_backend(finish.as_deref().or(Some("stop"))),
            self.usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
        );
        if self.created > 0 {
            response.created = self.created;
        }
        response
    }
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OpenRouterChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChunkChoice {
    #[serde(default)]
    delta: OpenRouterDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenRouterDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::trickle_server;
    use futures::TryStreamExt;
    use gateway_core::Message;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenRouterProvider {
        let config = ProviderConfig::new("openrouter", "test-key", "openai/gpt-4", server.uri())
            .with_backoff_unit(Duration::from_millis(1));
        OpenRouterProvider::new(config).unwrap()
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "gen-123",
            "created": 1_700_000_000,
            "model": "openai/gpt-4",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12}
        })
    }

    #[test]
    fn test_default_models() {
        let config = ProviderConfig::new("openrouter", "k", "openai/gpt-4", DEFAULT_BASE_URL);
        let provider = OpenRouterProvider::new(config).unwrap();
        assert_eq!(provider.models().len(), 4);
        assert!(provider.models().contains(&"google/gemini-pro".to_string()));
        assert!(provider.initialize().is_ok());
    }

    #[test]
    fn test_initialize_requires_key() {
        let config = ProviderConfig::new("openrouter", "", "openai/gpt-4", DEFAULT_BASE_URL);
        let provider = OpenRouterProvider::new(config).unwrap();
        assert!(matches!(
            provider.initialize(),
            Err(GatewayError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_chat_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("x-title", DEFAULT_TITLE))
            .and(body_partial_json(json!({"model": "openai/gpt-4", "max_tokens": 1024})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::builder()
            .message(Message::user("Hello"))
            .build()
            .unwrap();
        let response = provider(&server)
            .chat(&CancellationToken::new(), &request)
            .await
            .unwrap();

        assert_eq!(response.content(), "Hi there");
        assert_eq!(response.finish_reason(), FinishReason::Stop);
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[tokio::test]
    async fn test_complete_empty_prompt_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("x")))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&CancellationToken::new(), "", &CompletionOverrides::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EmptyPrompt));
    }

    #[tokio::test]
    async fn test_complete_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("third time")))
            .with_priority(2)
            .mount(&server)
            .await;

        let overrides = CompletionOverrides::new().metadata("retries", 3);
        let completion = provider(&server)
            .complete(&CancellationToken::new(), "Hello", &overrides)
            .await
            .unwrap();

        assert_eq!(completion.content, "third time");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_complete_exhausts_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let overrides = CompletionOverrides::new().max_attempts(2);
        let err = provider(&server)
            .complete(&CancellationToken::new(), "Hello", &overrides)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AllAttemptsFailed { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": {"message": "bad model"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let overrides = CompletionOverrides::new().max_attempts(3);
        let err = provider(&server)
            .complete(&CancellationToken::new(), "Hello", &overrides)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("bad model"));
    }

    #[tokio::test]
    async fn test_invalid_override_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("x")))
            .expect(0)
            .mount(&server)
            .await;

        let overrides = CompletionOverrides::new().temperature(1.5);
        let err = provider(&server)
            .complete(&CancellationToken::new(), "Hello", &overrides)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig::new("openrouter", "k", "openai/gpt-4", server.uri())
            .with_timeout(Duration::from_millis(100));
        let err = OpenRouterProvider::new(config)
            .unwrap()
            .complete(&CancellationToken::new(), "Hello", &CompletionOverrides::new())
            .await
            .unwrap_err();

        match err {
            GatewayError::AllAttemptsFailed { source, .. } => {
                assert!(matches!(*source, GatewayError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_chat_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"id\":\"gen-1\",\"created\":1,\"model\":\"openai/gpt-4\",",
            "\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"},",
            "\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"gen-1\",\"created\":1,\"model\":\"openai/gpt-4\",",
            "\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"},",
            "\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"gen-1\",\"created\":1,\"model\":\"openai/gpt-4\",",
            "\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let request = ChatRequest::builder()
            .message(Message::user("Hello"))
            .stream(true)
            .build()
            .unwrap();
        let chunks: Vec<ChatResponse> = provider(&server)
            .chat_stream(&CancellationToken::new(), &request)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let text: String = chunks.iter().map(ChatResponse::content).collect();
        assert_eq!(text, "Hello world");
        assert_eq!(chunks.len(), 3);
        assert!(chunks.last().unwrap().is_final());
        assert!(chunks[..2].iter().all(|c| !c.is_final()));
    }

    #[tokio::test]
    async fn test_stream_without_finish_reason_gets_final_chunk() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"id\":\"gen-2\",\"created\":1,",
            "\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let completions: Vec<Completion> = provider(&server)
            .stream_complete(&CancellationToken::new(), "Hello")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(completions.len(), 2);
        assert_eq!(completions[0].content, "Hi");
        assert_eq!(completions[1].finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_stream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let request = ChatRequest::builder()
            .message(Message::user("Hello"))
            .build()
            .unwrap();
        let mut stream = provider(&server)
            .chat_stream(&CancellationToken::new(), &request)
            .await
            .unwrap();

        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(GatewayError::Authentication { .. })));
        assert!(stream.next().await.is_none());
    }

    fn sse_chunk(content: &str, finish_reason: Option<&str>) -> String {
        let chunk = json!({
            "id": "gen-3",
            "created": 1,
            "choices": [{
                "index": 0,
                "delta": {"content": content},
                "finish_reason": finish_reason,
            }],
        });
        format!("data: {chunk}\n\n")
    }

    fn streaming_request() -> ChatRequest {
        ChatRequest::builder()
            .message(Message::user("Hello"))
            .stream(true)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_stream_cut_before_done_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_chunk("Hel", None), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let items: Vec<GatewayResult<ChatResponse>> = provider(&server)
            .chat_stream(&CancellationToken::new(), &streaming_request())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content(), "Hel");
        assert!(!items[0].as_ref().unwrap().is_final());
        assert!(matches!(items[1], Err(GatewayError::Streaming { .. })));
    }

    #[tokio::test]
    async fn test_slow_stream_outlives_the_timeout() {
        let gap = Duration::from_millis(200);
        let base_url = trickle_server(vec![
            (Duration::ZERO, sse_chunk("a", None)),
            (gap, sse_chunk("b", None)),
            (gap, sse_chunk("c", None)),
            (gap, sse_chunk("", Some("stop"))),
            (Duration::ZERO, "data: [DONE]\n\n".to_string()),
        ])
        .await;
        // 800ms in total, never more than 200ms between events
        let config = ProviderConfig::new("openrouter", "test-key", "openai/gpt-4", base_url)
            .with_timeout(Duration::from_millis(400));

        let chunks: Vec<ChatResponse> = OpenRouterProvider::new(config)
            .unwrap()
            .chat_stream(&CancellationToken::new(), &streaming_request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let text: String = chunks.iter().map(ChatResponse::content).collect();
        assert_eq!(text, "abc");
        assert!(chunks.last().unwrap().is_final());
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let base_url = trickle_server(vec![
            (Duration::ZERO, sse_chunk("a", None)),
            (Duration::from_secs(2), sse_chunk("b", Some("stop"))),
        ])
        .await;
        let config = ProviderConfig::new("openrouter", "test-key", "openai/gpt-4", base_url)
            .with_timeout(Duration::from_millis(200));

        let items: Vec<GatewayResult<ChatResponse>> = OpenRouterProvider::new(config)
            .unwrap()
            .chat_stream(&CancellationToken::new(), &streaming_request())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content(), "a");
        assert!(matches!(items[1], Err(GatewayError::Timeout { .. })));
    }
}
