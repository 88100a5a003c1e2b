//! HTTP request handlers for the gateway API.

use axum::{extract::State, response::Response, Json};
use bytes::Bytes;
use gateway_routing::Dispatch;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::{
    encoder,
    error::ApiError,
    extractors::{ProviderSelector, RequestId},
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: Some(state.uptime_seconds()),
    })
}

/// Registered provider names
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Provider names, sorted
    pub providers: Vec<String>,
}

/// List providers endpoint
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let mut providers = state.router().providers();
    providers.sort();
    Json(ProvidersResponse { providers })
}

/// Model list (OpenAI compatible)
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Always `list`
    pub object: &'static str,
    /// Models across all providers
    pub data: Vec<ModelObject>,
}

/// One advertised model
#[derive(Debug, Serialize)]
pub struct ModelObject {
    /// Model identifier
    pub id: String,
    /// Always `model`
    pub object: &'static str,
    /// Provider serving the model
    pub owned_by: String,
}

/// List models endpoint (OpenAI compatible)
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let data: Vec<ModelObject> = state
        .router()
        .registry()
        .all_models()
        .into_iter()
        .map(|(provider, model)| ModelObject {
            id: model,
            object: "model",
            owned_by: provider,
        })
        .collect();

    debug!(count = data.len(), "Listing models");
    Json(ModelsResponse {
        object: "list",
        data,
    })
}

/// Chat completion request (OpenAI compatible)
///
/// The body is handed to the router undecoded so that a malformed payload and
/// a missing provider are reported the same way on every path.
#[instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn chat_completions(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ProviderSelector(provider): ProviderSelector,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = state.request_context();
    let start = Instant::now();

    let dispatch = state
        .router()
        .route(&ctx, provider.as_deref(), &body)
        .await
        .map_err(|e| {
            error!(
                request_id = %request_id,
                error = %e,
                error_type = e.error_type(),
                "Chat completion failed"
            );
            ApiError::from(e)
        })?;

    match dispatch {
        Dispatch::Complete(response) => {
            info!(
                request_id = %request_id,
                model = %response.model,
                latency_ms = start.elapsed().as_millis() as u64,
                "Chat completion succeeded"
            );
            Ok(encoder::json_response(response))
        }
        Dispatch::Stream(receiver) => {
            debug!(request_id = %request_id, "Streaming chat completion");
            Ok(encoder::sse_response(receiver))
        }
    }
}
