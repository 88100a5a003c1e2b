//! Stream multiplexer.
//!
//! Moves a backend chunk stream onto a single-slot channel drained by the
//! transport layer. One producer task per stream owns the sender through a
//! [`ProducerGuard`], so the channel is closed exactly once on every exit
//! path: completion, backend error, cancellation, or a vanished consumer.
//!
//! The channel holds one chunk; a slow consumer therefore blocks the
//! producer instead of letting output pile up in memory.

use futures::{Stream, StreamExt};
use gateway_core::{ChatResponse, ChunkStream, GatewayResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

/// Channel capacity (single-slot handoff)
const HANDOFF_SLOTS: usize = 1;

type Item = GatewayResult<ChatResponse>;

/// How the producer task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Cancelled,
    ConsumerGone,
}

/// Sole owner of the sender; dropping it closes the channel
struct ProducerGuard {
    tx: mpsc::Sender<Item>,
    outcome: Outcome,
    forwarded: usize,
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        debug!(
            outcome = ?self.outcome,
            chunks = self.forwarded,
            "Stream producer finished, closing channel"
        );
    }
}

/// Spawns stream producers
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamMultiplexer;

impl StreamMultiplexer {
    /// Multiplexer with the single-slot handoff
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start forwarding `stream` on its own task.
    ///
    /// The producer stops at the first error item (after forwarding it), when
    /// `ctx` is cancelled, or when the receiver is dropped. Dropping the
    /// returned receiver cancels `ctx`.
    pub fn spawn(&self, ctx: CancellationToken, stream: ChunkStream) -> ChunkReceiver {
        let (tx, rx) = mpsc::channel(HANDOFF_SLOTS);
        let producer_ctx = ctx.clone();

        let handle = tokio::spawn(async move {
            let mut guard = ProducerGuard {
                tx,
                outcome: Outcome::Completed,
                forwarded: 0,
            };
            produce(&producer_ctx, stream, &mut guard).await;
        });

        ChunkReceiver {
            rx,
            handle,
            _cancel_on_drop: ctx.drop_guard(),
        }
    }
}

async fn produce(ctx: &CancellationToken, mut stream: ChunkStream, guard: &mut ProducerGuard) {
    loop {
        let next = tokio::select! {
            biased;
            () = ctx.cancelled() => None,
            item = stream.next() => Some(item),
        };

        let item = match next {
            None => {
                guard.outcome = Outcome::Cancelled;
                return;
            }
            Some(None) => {
                guard.outcome = Outcome::Completed;
                return;
            }
            Some(Some(item)) => item,
        };
        let failed = item.is_err();

        let sent = tokio::select! {
            biased;
            () = ctx.cancelled() => None,
            sent = guard.tx.send(item) => Some(sent.is_ok()),
        };

        match sent {
            None => {
                guard.outcome = Outcome::Cancelled;
                return;
            }
            Some(false) => {
                guard.outcome = Outcome::ConsumerGone;
                return;
            }
            Some(true) => {}
        }
        guard.forwarded += 1;
        trace!(chunk = guard.forwarded, "Forwarded chunk");

        if failed {
            guard.outcome = Outcome::Failed;
            return;
        }
    }
}

/// Consumer side of a multiplexed stream
pub struct ChunkReceiver {
    rx: mpsc::Receiver<Item>,
    handle: JoinHandle<()>,
    _cancel_on_drop: DropGuard,
}

impl ChunkReceiver {
    /// Next chunk, or `None` once the producer closed the channel
    pub async fn recv(&mut self) -> Option<Item> {
        self.rx.recv().await
    }

    /// Whether the producer task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Adapt into a `Stream`; the receiver (and its cancel guard) lives as
    /// long as the stream
    pub fn into_stream(self) -> impl Stream<Item = Item> + Send + 'static {
        futures::stream::unfold(self, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
    }
}

impl std::fmt::Debug for ChunkReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReceiver")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::{FinishReason, GatewayError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn chunk(i: usize, last: bool) -> Item {
        let finish = if last { FinishReason::Stop } else { FinishReason::Unset };
        Ok(ChatResponse::chunk(format!("c-{i}"), "m", 0, format!("{i}"), finish))
    }

    fn finite(n: usize) -> ChunkStream {
        futures::stream::iter((0..n).map(move |i| chunk(i, i + 1 == n))).boxed()
    }

    async fn drain(rx: &mut ChunkReceiver) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_preserves_order_and_closes() {
        let mut rx = StreamMultiplexer::new().spawn(CancellationToken::new(), finite(20));

        let items = drain(&mut rx).await;
        let ids: Vec<String> = items
            .into_iter()
            .map(|i| i.unwrap().id)
            .collect();
        let expected: Vec<String> = (0..20).map(|i| format!("c-{i}")).collect();
        assert_eq!(ids, expected);

        // closed for good
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_error_item_ends_stream() {
        let stream = futures::stream::iter(vec![
            chunk(0, false),
            Err(GatewayError::streaming("backend died")),
            chunk(2, true),
        ])
        .boxed();
        let mut rx = StreamMultiplexer::new().spawn(CancellationToken::new(), stream);

        let items = drain(&mut rx).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(GatewayError::Streaming { .. })));
    }

    #[tokio::test]
    async fn test_cancel_closes_channel() {
        let ctx = CancellationToken::new();
        let pending = futures::stream::pending().boxed();
        let mut rx = StreamMultiplexer::new().spawn(ctx.clone(), pending);

        ctx.cancel();
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("channel should close promptly");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_drop_receiver_cancels_context() {
        let ctx = CancellationToken::new();
        let rx = StreamMultiplexer::new().spawn(ctx.clone(), futures::stream::pending().boxed());

        drop(rx);
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_slow_consumer_blocks_producer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let stream = futures::stream::iter(0..100)
            .map(move |i| {
                counter.fetch_add(1, Ordering::SeqCst);
                chunk(i, i == 99)
            })
            .boxed();

        let mut rx = StreamMultiplexer::new().spawn(CancellationToken::new(), stream);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // one chunk in the slot, one held by the blocked send
        assert!(produced.load(Ordering::SeqCst) <= 2);

        let items = drain(&mut rx).await;
        assert_eq!(items.len(), 100);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let rx = StreamMultiplexer::new().spawn(CancellationToken::new(), finite(3));
        let items: Vec<Item> = rx.into_stream().collect().await;

        assert_eq!(items.len(), 3);
        assert!(items[2].as_ref().unwrap().is_final());
    }
}
