//! Completion options.
//!
//! [`CompletionOptions`] is the fully resolved option set an adapter sends
//! to its backend. Provider-level defaults are combined with per-call
//! [`CompletionOverrides`] by a shallow field-by-field replace: a field set on
//! the override always wins, and overrides applied later win over earlier
//! ones.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default number of tokens to generate
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default retry budget (a single attempt)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Metadata key that sets the retry budget
pub const RETRIES_METADATA_KEY: &str = "retries";

/// Resolved completion options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Model identifier
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: f32,
    /// Retry budget for one logical call
    pub max_attempts: u32,
    /// Free-form caller metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CompletionOptions {
    /// Create options for a model with default sampling settings
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            metadata: HashMap::new(),
        }
    }

    /// Set max_tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Apply per-call overrides on top of these options
    #[must_use]
    pub fn apply(&self, overrides: &CompletionOverrides) -> Self {
        let mut resolved = self.clone();

        if let Some(model) = &overrides.model {
            resolved.model.clone_from(model);
        }
        if let Some(max_tokens) = overrides.max_tokens {
            resolved.max_tokens = max_tokens;
        }
        if let Some(temperature) = overrides.temperature {
            resolved.temperature = temperature;
        }
        for (key, value) in &overrides.metadata {
            resolved.metadata.insert(key.clone(), value.clone());
        }

        if let Some(retries) = overrides
            .metadata
            .get(RETRIES_METADATA_KEY)
            .and_then(serde_json::Value::as_u64)
        {
            resolved.max_attempts = u32::try_from(retries).unwrap_or(u32::MAX);
        }
        if let Some(max_attempts) = overrides.max_attempts {
            resolved.max_attempts = max_attempts;
        }

        resolved
    }

    /// Validate resolved per-call options
    ///
    /// # Errors
    /// Returns a validation error when a value is out of range
    pub fn validate(&self) -> GatewayResult<()> {
        self.check().map_err(|(field, message)| {
            let code = format!("invalid_{field}");
            GatewayError::validation(message, Some(field.to_string()), code)
        })
    }

    /// Validate static adapter configuration
    ///
    /// # Errors
    /// Returns a configuration error when a value is missing or out of range
    pub fn validate_config(&self) -> GatewayResult<()> {
        if self.model.is_empty() {
            return Err(GatewayError::configuration("model is required"));
        }
        self.check()
            .map_err(|(_, message)| GatewayError::configuration(message))
    }

    fn check(&self) -> Result<(), (&'static str, String)> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err((
                "temperature",
                format!(
                    "invalid temperature: must be between 0 and 1, got {}",
                    self.temperature
                ),
            ));
        }
        if self.max_tokens < 1 {
            return Err((
                "max_tokens",
                "invalid max tokens: must be greater than 0".to_string(),
            ));
        }
        if self.max_attempts < 1 {
            return Err((
                "max_attempts",
                "invalid max attempts: must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOverrides {
    /// Model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// max_tokens override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Retry budget override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Metadata entries merged into the resolved options
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CompletionOverrides {
    /// Create an empty override set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override max_tokens
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the temperature
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the retry budget
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add a metadata entry
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Layer `later` on top of `self`; fields set on `later` win
    #[must_use]
    pub fn merge(mut self, later: Self) -> Self {
        if later.model.is_some() {
            self.model = later.model;
        }
        if later.max_tokens.is_some() {
            self.max_tokens = later.max_tokens;
        }
        if later.temperature.is_some() {
            self.temperature = later.temperature;
        }
        if later.max_attempts.is_some() {
            self.max_attempts = later.max_attempts;
        }
        self.metadata.extend(later.metadata);
        self
    }
}
