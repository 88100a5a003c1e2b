//! Retry policy with linear backoff.
//!
//! Wraps one logical backend call with a bounded number of attempts. Before
//! attempt `i > 0` the policy waits `i * backoff_unit`; that delay races the
//! caller's cancellation token. If a rate limiter is configured every attempt
//! first takes a token from it.
//!
//! Cancellation and fatal (validation-class) errors stop the loop
//! immediately. Every other error is recorded and the next attempt runs; once
//! the budget is exhausted the last error is wrapped in
//! [`GatewayError::AllAttemptsFailed`].

use crate::rate_limit::TokenBucket;
use gateway_core::{GatewayError, GatewayResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts for one logical call when the caller does not override it
    pub max_attempts: u32,
    /// Backoff before attempt `i` is `i * backoff_unit`
    pub backoff_unit: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Per-call retry bookkeeping
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts performed so far
    pub attempt: u32,
    /// Last observed error
    pub last_error: Option<GatewayError>,
}

/// Retry policy implementation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    rate_limiter: Option<Arc<TokenBucket>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            rate_limiter: None,
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Attach a shared rate limiter
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Delay before the given attempt (0-indexed)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.config.backoff_unit.saturating_mul(attempt)
    }

    /// Take a rate limit token, if a limiter is configured
    ///
    /// # Errors
    /// Returns [`GatewayError::RateLimitCancelled`] if `ctx` is cancelled while waiting
    pub async fn acquire(&self, ctx: &CancellationToken) -> GatewayResult<()> {
        match &self.rate_limiter {
            Some(limiter) => limiter.acquire(ctx).await,
            None => Ok(()),
        }
    }

    /// Execute with the configured attempt budget
    ///
    /// # Errors
    /// Returns the first fatal error, or `AllAttemptsFailed` wrapping the last error
    pub async fn execute<F, Fut, T>(
        &self,
        ctx: &CancellationToken,
        operation: F,
    ) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.execute_with_attempts(ctx, self.config.max_attempts, operation)
            .await
    }

    /// Execute with an explicit attempt budget
    ///
    /// # Errors
    /// Returns the first fatal error, or `AllAttemptsFailed` wrapping the last error
    pub async fn execute_with_attempts<F, Fut, T>(
        &self,
        ctx: &CancellationToken,
        max_attempts: u32,
        mut operation: F,
    ) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let budget = max_attempts.max(1);
        let mut state = RetryState::default();

        while state.attempt < budget {
            if state.attempt > 0 {
                let delay = self.delay_for_attempt(state.attempt);
                warn!(
                    attempt = state.attempt + 1,
                    max_attempts = budget,
                    delay_ms = delay.as_millis(),
                    error = ?state.last_error.as_ref().map(ToString::to_string),
                    "Retrying request"
                );

                tokio::select! {
                    biased;
                    () = ctx.cancelled() => return Err(GatewayError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            self.acquire(ctx).await?;

            let result = tokio::select! {
                biased;
                () = ctx.cancelled() => Err(GatewayError::Cancelled),
                result = operation() => result,
            };
            state.attempt += 1;

            match result {
                Ok(value) => {
                    if state.attempt > 1 {
                        debug!(attempt = state.attempt, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if ctx.is_cancelled() || error.is_fatal() {
                        return Err(error);
                    }
                    state.last_error = Some(error);
                }
            }
        }

        Err(match state.last_error {
            Some(last) => GatewayError::all_attempts_failed(state.attempt, last),
            None => GatewayError::internal("retry loop finished without an attempt"),
        })
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether a rate limiter is attached
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limiter.is_some()
    }
}

/// Builder for retry policy
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    config: RetryConfig,
    rate_limiter: Option<Arc<TokenBucket>>,
}

impl RetryPolicyBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default attempt budget
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    /// Set the backoff unit
    #[must_use]
    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.config.backoff_unit = unit;
        self
    }

    /// Attach a rate limiter
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Build the policy
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            config: self.config,
            rate_limiter: self.rate_limiter,
        }
    }
}
