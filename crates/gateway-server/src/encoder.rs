//! Response encoding.
//!
//! A synchronous dispatch becomes one JSON body. A streaming dispatch becomes
//! a Server-Sent-Events body with one `data:` frame per chunk, terminated by
//! `data: [DONE]`. A failure after the stream has started can no longer change
//! the status code, so it is written as a final error frame before `[DONE]`.

use axum::{
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{stream, StreamExt};
use gateway_core::{ChatResponse, GatewayError, GatewayResult};
use gateway_routing::ChunkReceiver;
use std::convert::Infallible;
use tracing::warn;

/// Stream terminator frame payload
pub const DONE: &str = "[DONE]";

/// Encode a complete response
pub fn json_response(response: ChatResponse) -> Response {
    Json(response).into_response()
}

/// Encode a chunk stream as Server-Sent-Events
pub fn sse_response(receiver: ChunkReceiver) -> Response {
    let events = receiver
        .into_stream()
        .map(|item| Ok::<_, Infallible>(chunk_event(item)));
    let done = stream::once(async { Ok::<_, Infallible>(Event::default().data(DONE)) });

    Sse::new(events.chain(done))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// One SSE frame for a stream item
pub fn chunk_event(item: GatewayResult<ChatResponse>) -> Event {
    match item {
        Ok(chunk) => match serde_json::to_string(&chunk) {
            Ok(data) => Event::default().data(data),
            Err(e) => error_event(&GatewayError::internal(format!("failed to encode chunk: {e}"))),
        },
        Err(err) => {
            warn!(error = %err, "Stream failed after headers were sent");
            error_event(&err)
        }
    }
}

fn error_event(err: &GatewayError) -> Event {
    let body = serde_json::json!({
        "error": {
            "message": err.to_string(),
            "type": "stream_error",
        }
    });
    Event::default().data(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::FinishReason;
    use gateway_routing::StreamMultiplexer;
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_sse_frames_end_with_done() {
        let chunks = futures::stream::iter(vec![
            Ok(ChatResponse::chunk("c-0", "m", 0, "Hi ", FinishReason::Unset)),
            Ok(ChatResponse::chunk("c-1", "m", 0, "there", FinishReason::Stop)),
        ])
        .boxed();
        let receiver = StreamMultiplexer::new().spawn(CancellationToken::new(), chunks);

        let text = body_text(sse_response(receiver)).await;
        let frames: Vec<&str> = text
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .collect();

        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"Hi \""));
        assert!(frames[1].contains("\"finish_reason\":\"stop\""));
        assert_eq!(frames[2], DONE);
    }

    #[tokio::test]
    async fn test_sse_error_frame() {
        let chunks = futures::stream::iter(vec![
            Ok(ChatResponse::chunk("c-0", "m", 0, "Hi ", FinishReason::Unset)),
            Err(GatewayError::streaming("backend went away")),
        ])
        .boxed();
        let receiver = StreamMultiplexer::new().spawn(CancellationToken::new(), chunks);

        let text = body_text(sse_response(receiver)).await;
        let frames: Vec<&str> = text
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .collect();

        assert_eq!(frames.len(), 3);
        let error: serde_json::Value = serde_json::from_str(frames[1]).unwrap();
        assert_eq!(error["error"]["type"], "stream_error");
        assert!(error["error"]["message"]
            .as_str()
            .unwrap()
            .contains("backend went away"));
        assert_eq!(frames[2], DONE);
    }
}
