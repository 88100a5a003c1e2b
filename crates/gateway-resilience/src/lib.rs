//! # Gateway Resilience
//!
//! Resilience patterns for the chat completion gateway:
//! - Bounded retry with linear, cancellation-aware backoff
//! - Token bucket rate limiting shared across concurrent calls

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod rate_limit;
pub mod retry;

// Re-export main types
pub use rate_limit::{RateLimitConfig, TokenBucket};
pub use retry::{RetryConfig, RetryPolicy, RetryPolicyBuilder, RetryState};
