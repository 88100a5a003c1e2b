//! Request router.
//!
//! Takes a raw inbound request plus a provider selector through the routing
//! lifecycle:
//!
//! ```text
//! Received -> Validated -> Routed -> DispatchedSync   -> Responded
//!                                 -> DispatchedStream -> Responded
//! (any state) -> Errored
//! ```
//!
//! Decoding and selector checks happen on `Received -> Validated`, the
//! registry lookup on `Validated -> Routed`, and the request's `stream` flag
//! picks the dispatch branch.
//!
//! A streamed request reaches `Responded` once its receiver is handed back,
//! before any chunk is drained. Failures after that point arrive as error
//! items on the receiver and leave the route phase untouched; the stream's
//! own outcome is logged by the multiplexer when its producer closes the
//! channel.

use crate::multiplexer::{ChunkReceiver, StreamMultiplexer};
use gateway_core::{ChatRequest, ChatResponse, GatewayError, GatewayResult, LLMProvider};
use gateway_providers::ProviderRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of one routed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    /// Raw request accepted
    Received,
    /// Body decoded and selector present
    Validated,
    /// Adapter resolved
    Routed,
    /// Synchronous call in flight
    DispatchedSync,
    /// Stream handed to the multiplexer
    DispatchedStream,
    /// Response produced, or stream receiver handed back
    Responded,
    /// Absorbing failure state
    Errored,
}

impl RoutePhase {
    /// Whether `self -> next` is a legal transition
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use RoutePhase::{
            DispatchedStream, DispatchedSync, Errored, Received, Responded, Routed, Validated,
        };
        match (self, next) {
            (Errored, _) => false,
            (_, Errored) => true,
            (Received, Validated)
            | (Validated, Routed)
            | (Routed, DispatchedSync | DispatchedStream)
            | (DispatchedSync | DispatchedStream, Responded) => true,
            _ => false,
        }
    }

    /// Whether no further transitions are possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Responded | Self::Errored)
    }
}

impl std::fmt::Display for RoutePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Validated => write!(f, "validated"),
            Self::Routed => write!(f, "routed"),
            Self::DispatchedSync => write!(f, "dispatched_sync"),
            Self::DispatchedStream => write!(f, "dispatched_stream"),
            Self::Responded => write!(f, "responded"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// Phase tracker for a single request
#[derive(Debug)]
struct RouteTrace {
    phase: RoutePhase,
}

impl RouteTrace {
    fn new() -> Self {
        Self {
            phase: RoutePhase::Received,
        }
    }

    fn advance(&mut self, next: RoutePhase) -> GatewayResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(GatewayError::internal(format!(
                "illegal route transition {} -> {}",
                self.phase, next
            )));
        }
        debug!(from = %self.phase, to = %next, "Route transition");
        self.phase = next;
        Ok(())
    }

    /// Record `err` and hand it back
    fn fail(&mut self, err: GatewayError) -> GatewayError {
        warn!(phase = %self.phase, error = %err, "Request failed");
        self.phase = RoutePhase::Errored;
        err
    }
}

/// Outcome of a dispatched request
#[derive(Debug)]
pub enum Dispatch {
    /// Single JSON response
    Complete(ChatResponse),
    /// Ordered chunk stream
    Stream(ChunkReceiver),
}

/// Routes requests to registered adapters
#[derive(Debug, Clone)]
pub struct GatewayRouter {
    registry: Arc<ProviderRegistry>,
    multiplexer: StreamMultiplexer,
}

impl GatewayRouter {
    /// Create a router over `registry`
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            multiplexer: StreamMultiplexer::new(),
        }
    }

    /// Replace the stream multiplexer
    #[must_use]
    pub fn with_multiplexer(mut self, multiplexer: StreamMultiplexer) -> Self {
        self.multiplexer = multiplexer;
        self
    }

    /// The underlying registry
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Names of every registered provider
    #[must_use]
    pub fn providers(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Run a raw request through the full lifecycle.
    ///
    /// # Errors
    /// - [`GatewayError::BadRequest`] for a missing selector or malformed body
    /// - [`GatewayError::ProviderNotFound`] for an unknown provider
    /// - whatever the adapter returns on the synchronous path or while opening
    ///   the stream
    pub async fn route(
        &self,
        ctx: &CancellationToken,
        selector: Option<&str>,
        body: &[u8],
    ) -> GatewayResult<Dispatch> {
        let mut trace = RouteTrace::new();

        let (provider_name, request) = match decode(selector, body) {
            Ok(decoded) => decoded,
            Err(err) => return Err(trace.fail(err)),
        };
        trace.advance(RoutePhase::Validated)?;

        let provider = self.lookup(&provider_name).map_err(|e| trace.fail(e))?;
        trace.advance(RoutePhase::Routed)?;

        let result = if request.stream {
            trace.advance(RoutePhase::DispatchedStream)?;
            self.open_stream(ctx, provider.as_ref(), &request)
                .await
                .map(Dispatch::Stream)
        } else {
            trace.advance(RoutePhase::DispatchedSync)?;
            provider.chat(ctx, &request).await.map(Dispatch::Complete)
        };
        let dispatch = result.map_err(|e| trace.fail(e))?;

        trace.advance(RoutePhase::Responded)?;
        match &dispatch {
            Dispatch::Complete(_) => info!(provider = %provider_name, "Request completed"),
            Dispatch::Stream(_) => info!(provider = %provider_name, "Stream handed off"),
        }
        Ok(dispatch)
    }

    /// Synchronous chat against `provider`
    ///
    /// # Errors
    /// Returns `ProviderNotFound` or the adapter error
    pub async fn chat(
        &self,
        ctx: &CancellationToken,
        provider: &str,
        request: &ChatRequest,
    ) -> GatewayResult<ChatResponse> {
        self.lookup(provider)?.chat(ctx, request).await
    }

    /// Streaming chat against `provider`.
    ///
    /// Chunks arrive on the returned receiver; the channel closes once the
    /// backend finishes, fails, or `ctx` is cancelled.
    ///
    /// # Errors
    /// Returns `ProviderNotFound` or the error raised while opening the stream
    pub async fn stream_chat(
        &self,
        ctx: &CancellationToken,
        provider: &str,
        request: &ChatRequest,
    ) -> GatewayResult<ChunkReceiver> {
        let provider = self.lookup(provider)?;
        self.open_stream(ctx, provider.as_ref(), request).await
    }

    fn lookup(&self, name: &str) -> GatewayResult<Arc<dyn LLMProvider>> {
        self.registry.get(name)
    }

    async fn open_stream(
        &self,
        ctx: &CancellationToken,
        provider: &dyn LLMProvider,
        request: &ChatRequest,
    ) -> GatewayResult<ChunkReceiver> {
        let chunks = provider.chat_stream(ctx, request).await?;
        Ok(self.multiplexer.spawn(ctx.clone(), chunks))
    }
}

fn decode(selector: Option<&str>, body: &[u8]) -> GatewayResult<(String, ChatRequest)> {
    let provider = selector
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::bad_request("Provider not specified"))?;

    let request: ChatRequest = serde_json::from_slice(body)
        .map_err(|e| GatewayError::bad_request(format!("Invalid request body: {e}")))?;

    Ok((provider.to_string(), request))
}
