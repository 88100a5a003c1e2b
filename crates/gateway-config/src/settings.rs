//! Configuration model.

use crate::error::ConfigError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server settings
    pub server: ServerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
    /// Backend adapters
    pub providers: ProvidersConfig,
}

impl GatewayConfig {
    /// Check ranges across every section
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Invalid("server.host cannot be empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port cannot be 0".into()));
        }
        if let Some(openrouter) = &self.providers.openrouter {
            openrouter.validate("openrouter")?;
        }
        if let Some(anthropic) = &self.providers.anthropic {
            anthropic.validate("anthropic")?;
        }
        Ok(())
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Grace period for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level filter (`RUST_LOG` wins when set)
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Backend adapter sections
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenRouter adapter
    pub openrouter: Option<ProviderSettings>,
    /// Anthropic adapter
    pub anthropic: Option<ProviderSettings>,
    /// In-process mock backend
    pub mock: MockSettings,
}

/// Settings for one HTTP backend
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// Backend credential
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Default model; adapters fall back to their own when unset
    #[serde(default)]
    pub model: Option<String>,
    /// Override the backend base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Default max_tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Default retry budget
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Optional token bucket
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            timeout: default_timeout(),
            rate_limit: None,
        }
    }
}

impl ProviderSettings {
    /// Whether a non-empty credential is present
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "providers.{section}.temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid(format!(
                "providers.{section}.max_tokens must be at least 1"
            )));
        }
        if let Some(limit) = &self.rate_limit {
            if limit.requests_per_second <= 0.0 || limit.burst == 0 {
                return Err(ConfigError::Invalid(format!(
                    "providers.{section}.rate_limit must have a positive rate and burst"
                )));
            }
        }
        Ok(())
    }
}

/// Token bucket settings
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitSettings {
    /// Sustained rate
    pub requests_per_second: f64,
    /// Bucket capacity
    pub burst: u32,
}

/// Mock backend settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// Register the mock provider
    pub enabled: bool,
    /// Override the fixed response content
    pub content: Option<String>,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_attempts() -> u32 {
    1
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
