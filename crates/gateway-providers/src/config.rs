//! Adapter configuration shared by the HTTP backends.

use gateway_core::{CompletionOptions, GatewayError, GatewayResult};
use gateway_resilience::{RateLimitConfig, RetryConfig, RetryPolicy, TokenBucket};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend adapter configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Registry name of the adapter
    pub name: String,
    /// Backend credential
    pub api_key: SecretString,
    /// Backend base URL
    pub base_url: String,
    /// Provider-level default options
    pub defaults: CompletionOptions,
    /// Models advertised by the adapter
    pub models: Vec<String>,
    /// Bounds a synchronous round trip and the idle gap between stream events
    pub timeout: Duration,
    /// Optional token bucket
    pub rate_limit: Option<RateLimitConfig>,
    /// Linear backoff unit between attempts
    pub backoff_unit: Duration,
}

impl ProviderConfig {
    /// Create a configuration with default sampling settings
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: SecretString::new(api_key.into()),
            base_url: base_url.into(),
            defaults: CompletionOptions::new(model),
            models: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            rate_limit: None,
            backoff_unit: RetryConfig::default().backoff_unit,
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the default max_tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.defaults.max_tokens = max_tokens;
        self
    }

    /// Set the default temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.defaults.temperature = temperature;
        self
    }

    /// Set the default retry budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.defaults.max_attempts = max_attempts;
        self
    }

    /// Set the advertised models
    #[must_use]
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable rate limiting
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Set the backoff unit
    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Build the retry policy (and rate limiter) for this adapter
    ///
    /// # Errors
    /// Returns a configuration error if the rate limit is invalid
    pub fn retry_policy(&self) -> GatewayResult<RetryPolicy> {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: self.defaults.max_attempts,
            backoff_unit: self.backoff_unit,
        });

        match self.rate_limit {
            Some(limit) => Ok(policy.with_rate_limiter(Arc::new(TokenBucket::new(limit)?))),
            None => Ok(policy),
        }
    }

    /// Validate credentials and defaults
    ///
    /// # Errors
    /// Returns a configuration error describing the first invalid field
    pub fn validate(&self) -> GatewayResult<()> {
        if self.api_key.expose_secret().is_empty() {
            return Err(GatewayError::configuration(format!(
                "API key is required for provider '{}'",
                self.name
            )));
        }
        if self.base_url.is_empty() {
            return Err(GatewayError::configuration("base URL is required"));
        }
        self.defaults.validate_config()
    }
}
