//! Streaming types.
//!
//! Backends expose incremental output as boxed streams of canonical chunks.

use crate::error::GatewayResult;
use crate::response::{ChatResponse, Completion};
use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Stream of canonical chat chunks
pub type ChunkStream = BoxStream<'static, GatewayResult<ChatResponse>>;

/// Stream of partial completions
pub type CompletionStream = BoxStream<'static, GatewayResult<Completion>>;

/// Stop yielding from `stream` as soon as `ctx` is cancelled.
///
/// The inner stream is dropped on cancellation, which closes the backend
/// connection.
pub fn cancellable<T>(
    ctx: CancellationToken,
    stream: BoxStream<'static, T>,
) -> BoxStream<'static, T>
where
    T: Send + 'static,
{
    let mut inner = stream;
    let s = async_stream::stream! {
        loop {
            tokio::select! {
                biased;
                () = ctx.cancelled() => break,
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    s.boxed()
}
