//! Error classification and stream plumbing shared by the HTTP adapters.

use futures::StreamExt;
use gateway_core::{GatewayError, GatewayResult};
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use std::time::Duration;

/// Map a non-success backend status to a gateway error
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> GatewayError {
    let message = extract_message(body).unwrap_or_else(|| format!("HTTP {status}: {body}"));

    match status {
        400 | 422 => GatewayError::validation(message, None, "backend_rejected"),
        401 | 403 => GatewayError::authentication(message),
        429 => GatewayError::provider(provider, message, Some(status), true),
        500..=599 => GatewayError::provider(provider, message, Some(status), true),
        _ => GatewayError::provider(provider, message, Some(status), false),
    }
}

/// Map a transport failure; everything but a timeout is retryable
pub(crate) fn transport_error(
    provider: &str,
    err: &reqwest::Error,
    timeout: Duration,
) -> GatewayError {
    if err.is_timeout() {
        GatewayError::timeout(timeout)
    } else {
        GatewayError::provider(provider, format!("request failed: {err}"), None, true)
    }
}

/// Next event of a backend stream.
///
/// `idle` bounds the gap between events, not the stream as a whole. A stalled
/// stream is closed and reported as [`GatewayError::Timeout`].
pub(crate) async fn next_event(
    es: &mut EventSource,
    idle: Duration,
) -> GatewayResult<Option<Result<Event, EventSourceError>>> {
    match tokio::time::timeout(idle, es.next()).await {
        Ok(next) => Ok(next),
        Err(_) => {
            es.close();
            Err(GatewayError::timeout(idle))
        }
    }
}

/// Both backends wrap errors as `{"error": {"message": ...}}`
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(ToString::to_string)
}
