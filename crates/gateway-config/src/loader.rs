//! Configuration loading.
//!
//! Order of precedence, lowest first: built-in defaults, the config file
//! named by `GATEWAY_CONFIG`, environment variables.

use crate::error::ConfigError;
use crate::settings::{GatewayConfig, ProviderSettings};
use secrecy::SecretString;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Load configuration from `GATEWAY_CONFIG` (if set) and the environment.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, an environment
/// variable is malformed, or the result fails validation
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => load_from_path(&path).await?,
        _ => {
            debug!("No config file given, using defaults");
            GatewayConfig::default()
        }
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Parse a YAML or TOML file, chosen by extension
///
/// # Errors
/// Returns an error if the file cannot be read, has an unknown extension or
/// does not parse
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&raw).map_err(|e| parse_error(e.to_string()))?
        }
        Some("toml") => toml::from_str(&raw).map_err(|e| parse_error(e.to_string()))?,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    info!(path = %path.display(), "Configuration file loaded");
    Ok(config)
}

impl GatewayConfig {
    /// Apply environment overrides through `lookup`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] for an unparsable value
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PORT".into(),
                value: port,
            })?;
        }
        if let Some(host) = lookup("GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("GATEWAY_LOG_JSON") {
            self.logging.json = parse_bool("GATEWAY_LOG_JSON", json)?;
        }
        if let Some(enabled) = lookup("GATEWAY_ENABLE_MOCK") {
            self.providers.mock.enabled = parse_bool("GATEWAY_ENABLE_MOCK", enabled)?;
        }

        override_provider(
            &mut self.providers.openrouter,
            lookup("OPENROUTER_API_KEY"),
            lookup("OPENROUTER_MODEL"),
        );
        override_provider(
            &mut self.providers.anthropic,
            lookup("ANTHROPIC_API_KEY"),
            lookup("ANTHROPIC_MODEL"),
        );

        Ok(())
    }
}

/// A key or model in the environment creates the section if missing
fn override_provider(
    section: &mut Option<ProviderSettings>,
    api_key: Option<String>,
    model: Option<String>,
) {
    if api_key.is_none() && model.is_none() {
        return;
    }
    let settings = section.get_or_insert_with(ProviderSettings::default);
    if let Some(key) = api_key {
        settings.api_key = Some(SecretString::new(key));
    }
    if let Some(model) = model {
        settings.model = Some(model);
    }
}

fn parse_bool(key: &str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value,
        }),
    }
}
