//! # Chat Gateway
//!
//! One chat completion API in front of several LLM backends.
//!
//! ## Usage
//!
//! ```bash
//! # Mock backend only
//! GATEWAY_ENABLE_MOCK=true chat-gateway
//!
//! # Config file plus credentials from the environment
//! GATEWAY_CONFIG=/etc/chat-gateway.yaml OPENROUTER_API_KEY=sk-or-... chat-gateway
//! ```

use anyhow::{bail, Context};
use gateway_config::{load_config, GatewayConfig, ProviderSettings};
use gateway_core::LLMProvider;
use gateway_providers::{
    anthropic, openrouter, AnthropicProvider, MockProvider, OpenRouterProvider, ProviderConfig,
    ProviderRegistry,
};
use gateway_resilience::RateLimitConfig;
use gateway_server::{AppState, Server, ServerConfig};
use gateway_telemetry::{init_logging, LoggingConfig};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()
        .await
        .context("failed to load configuration")?;

    init_logging(
        &LoggingConfig::new()
            .with_level(&config.logging.level)
            .with_json(config.logging.json),
    )
    .context("failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting chat gateway"
    );

    let registry = build_registry(&config)?;
    if registry.is_empty() {
        bail!(
            "no providers configured: set OPENROUTER_API_KEY, ANTHROPIC_API_KEY \
             or GATEWAY_ENABLE_MOCK"
        );
    }
    info!(providers = ?registry.list(), "Provider registry initialized");

    let state = AppState::new(Arc::new(registry));
    let server_config = ServerConfig::new(&config.server.host, config.server.port)
        .with_shutdown_timeout(config.server.shutdown_timeout);

    Server::new(server_config, state).run().await?;
    info!("Chat gateway stopped");
    Ok(())
}

/// Create and initialize every configured adapter
fn build_registry(config: &GatewayConfig) -> anyhow::Result<ProviderRegistry> {
    let registry = ProviderRegistry::new();

    if let Some(settings) = &config.providers.openrouter {
        if settings.has_api_key() {
            let provider_config = provider_config(
                "openrouter",
                settings,
                openrouter::DEFAULT_MODEL,
                openrouter::DEFAULT_BASE_URL,
            );
            register(&registry, OpenRouterProvider::new(provider_config)?)?;
        } else {
            warn!("OpenRouter section present without an API key, skipping");
        }
    }

    if let Some(settings) = &config.providers.anthropic {
        if settings.has_api_key() {
            let provider_config = provider_config(
                "anthropic",
                settings,
                anthropic::DEFAULT_MODEL,
                anthropic::DEFAULT_BASE_URL,
            );
            register(&registry, AnthropicProvider::new(provider_config)?)?;
        } else {
            warn!("Anthropic section present without an API key, skipping");
        }
    }

    if config.providers.mock.enabled {
        let mut mock = MockProvider::new("mock");
        if let Some(content) = &config.providers.mock.content {
            mock = mock.with_content(content);
        }
        register(&registry, mock)?;
    }

    Ok(registry)
}

fn register(
    registry: &ProviderRegistry,
    provider: impl LLMProvider + 'static,
) -> anyhow::Result<()> {
    let name = provider.name().to_string();
    provider
        .initialize()
        .with_context(|| format!("provider {name} failed to initialize"))?;
    registry.register(Arc::new(provider))?;
    info!(provider = %name, "Provider registered");
    Ok(())
}

fn provider_config(
    name: &str,
    settings: &ProviderSettings,
    default_model: &str,
    default_base_url: &str,
) -> ProviderConfig {
    let api_key = settings
        .api_key
        .as_ref()
        .map(|k| k.expose_secret().clone())
        .unwrap_or_default();
    let model = settings.model.as_deref().unwrap_or(default_model);
    let base_url = settings.base_url.as_deref().unwrap_or(default_base_url);

    let mut config = ProviderConfig::new(name, api_key, model, base_url)
        .with_max_tokens(settings.max_tokens)
        .with_temperature(settings.temperature)
        .with_max_attempts(settings.max_attempts)
        .with_timeout(settings.timeout);
    if let Some(limit) = settings.rate_limit {
        let rate_limit = RateLimitConfig::new(limit.requests_per_second, limit.burst);
        config = config.with_rate_limit(rate_limit);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_registry_from_config() {
        let mut config = GatewayConfig::default();
        config.providers.mock.enabled = true;
        config.providers.openrouter = Some(ProviderSettings {
            api_key: Some(SecretString::new("sk-or-test".to_string())),
            ..ProviderSettings::default()
        });
        config.providers.anthropic = Some(ProviderSettings::default());

        let registry = build_registry(&config).unwrap();
        let mut names = registry.list();
        names.sort();
        assert_eq!(names, vec!["mock", "openrouter"]);

        let openrouter = registry.get("openrouter").unwrap();
        assert_eq!(openrouter.defaults().model, openrouter::DEFAULT_MODEL);
    }

    #[test]
    fn test_provider_config_mapping() {
        let settings = ProviderSettings {
            api_key: Some(SecretString::new("key".to_string())),
            model: Some("claude-3-opus-20240229".to_string()),
            max_attempts: 3,
            rate_limit: Some(gateway_config::RateLimitSettings {
                requests_per_second: 2.0,
                burst: 4,
            }),
            ..ProviderSettings::default()
        };

        let config = provider_config(
            "anthropic",
            &settings,
            anthropic::DEFAULT_MODEL,
            anthropic::DEFAULT_BASE_URL,
        );
        assert_eq!(config.defaults.model, "claude-3-opus-20240229");
        assert_eq!(config.defaults.max_attempts, 3);
        assert_eq!(config.base_url, anthropic::DEFAULT_BASE_URL);
        assert_eq!(config.rate_limit.map(|r| r.burst), Some(4));
        assert!(config.validate().is_ok());
    }
}
