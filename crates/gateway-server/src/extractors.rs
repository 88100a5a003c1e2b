//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;

/// Header naming the target provider
pub const PROVIDER_HEADER: &str = "x-provider";

/// Query parameter naming the target provider
pub const PROVIDER_QUERY: &str = "provider";

/// Provider selector: `X-Provider` header first, then `?provider=`.
///
/// Absence is not a rejection here; the router turns it into a bad request.
#[derive(Debug, Clone)]
pub struct ProviderSelector(pub Option<String>);

#[derive(Debug, Deserialize)]
struct SelectorQuery {
    provider: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ProviderSelector
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get(PROVIDER_HEADER) {
            if let Ok(name) = value.to_str() {
                if !name.is_empty() {
                    return Ok(Self(Some(name.to_string())));
                }
            }
        }

        let from_query = Query::<SelectorQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.provider)
            .filter(|p| !p.is_empty());

        if from_query.is_none() {
            debug!("Request carries no provider selector");
        }
        Ok(Self(from_query))
    }
}

/// Extract request ID from headers or generate one
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-request-id")
            .or_else(|| parts.headers.get("x-correlation-id"))
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        Ok(Self(id))
    }
}
