//! Token bucket rate limiter.
//!
//! One bucket is owned by an adapter and shared by every in-flight call to
//! it. Callers never hold the internal lock; it is taken only to refill and
//! take a token.

use gateway_core::{GatewayError, GatewayResult};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained token refill rate
    pub requests_per_second: f64,
    /// Bucket capacity
    pub burst: u32,
}

impl RateLimitConfig {
    /// Create a new rate limit configuration
    #[must_use]
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            requests_per_second,
            burst,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiter
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket
    ///
    /// # Errors
    /// Returns a configuration error if the rate is not positive or the burst is zero
    pub fn new(config: RateLimitConfig) -> GatewayResult<Self> {
        if !(config.requests_per_second.is_finite() && config.requests_per_second > 0.0) {
            return Err(GatewayError::configuration(format!(
                "rate limit must be positive, got {}",
                config.requests_per_second
            )));
        }
        if config.burst == 0 {
            return Err(GatewayError::configuration("rate limit burst must be at least 1"));
        }

        let capacity = f64::from(config.burst);
        Ok(Self {
            capacity,
            refill_per_sec: config.requests_per_second,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Take a token without waiting.
    ///
    /// # Errors
    /// Returns the time until the next token is available when the bucket is empty
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    /// Wait for a token, bounded by `ctx`.
    ///
    /// # Errors
    /// Returns [`GatewayError::RateLimitCancelled`] if `ctx` is cancelled first
    pub async fn acquire(&self, ctx: &CancellationToken) -> GatewayResult<()> {
        loop {
            if ctx.is_cancelled() {
                return Err(GatewayError::RateLimitCancelled);
            }

            match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    trace!(wait_ms = wait.as_millis(), "Rate limited, waiting for token");
                    tokio::select! {
                        biased;
                        () = ctx.cancelled() => return Err(GatewayError::RateLimitCancelled),
                        () = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Tokens currently available (after refill)
    #[must_use]
    pub fn available(&self) -> f64 {
        let state = self.state.lock();
        let elapsed = Instant::now()
            .saturating_duration_since(state.last_refill)
            .as_secs_f64();
        (state.tokens + elapsed * self.refill_per_sec).min(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_invalid_config() {
        assert!(TokenBucket::new(RateLimitConfig::new(0.0, 1)).is_err());
        assert!(TokenBucket::new(RateLimitConfig::new(1.0, 0)).is_err());
        assert!(TokenBucket::new(RateLimitConfig::new(f64::NAN, 1)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_wait() {
        let bucket = TokenBucket::new(RateLimitConfig::new(1.0, 2)).unwrap();

        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_ok());

        let wait = bucket.try_acquire().unwrap_err();
        assert!(wait <= Duration::from_secs(1));
        assert!(wait > Duration::from_millis(900));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(bucket.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_blocks_until_refill() {
        let bucket = TokenBucket::new(RateLimitConfig::new(2.0, 1)).unwrap();
        let ctx = CancellationToken::new();

        bucket.acquire(&ctx).await.unwrap();

        let start = Instant::now();
        bucket.acquire(&ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(490));
    }

    #[tokio::test]
    async fn test_acquire_cancelled() {
        let bucket = TokenBucket::new(RateLimitConfig::new(0.001, 1)).unwrap();
        let ctx = CancellationToken::new();
        bucket.acquire(&ctx).await.unwrap();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(2), bucket.acquire(&ctx))
            .await
            .expect("acquire should return promptly after cancellation");
        assert!(matches!(result, Err(GatewayError::RateLimitCancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_context_is_fatal() {
        let bucket = TokenBucket::new(RateLimitConfig::new(10.0, 5)).unwrap();
        let ctx = CancellationToken::new();
        ctx.cancel();

        assert!(matches!(
            bucket.acquire(&ctx).await,
            Err(GatewayError::RateLimitCancelled)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_across_tasks() {
        let bucket = Arc::new(TokenBucket::new(RateLimitConfig::new(0.001, 3)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                tokio::spawn(async move { bucket.try_acquire().is_ok() })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 3);
    }
}
